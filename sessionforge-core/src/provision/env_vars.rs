//! Provisioning of item fields as plain environment variables.

use async_trait::async_trait;

use super::{ProvisionContext, ProvisionError, ProvisionInput, ProvisionOutput, Provisioner};
use crate::model::FieldMapping;

/// Sets one environment variable per mapped field present on the item.
///
/// The mapping is the same table the environment discovery strategy reads,
/// so a credential imported from `NIRMATA_TOKEN` is provisioned back into
/// `NIRMATA_TOKEN`.
#[derive(Debug, Clone)]
pub struct EnvVarProvisioner {
    mapping: FieldMapping,
    description: String,
}

impl EnvVarProvisioner {
    pub fn new(mapping: FieldMapping) -> Self {
        let names: Vec<&str> = mapping.iter().map(|(name, _)| name).collect();
        let description = format!("Provision environment variables {}", names.join(", "));
        Self {
            mapping,
            description,
        }
    }
}

#[async_trait]
impl Provisioner for EnvVarProvisioner {
    fn description(&self) -> &str {
        &self.description
    }

    async fn provision(
        &self,
        _ctx: &ProvisionContext,
        input: &ProvisionInput,
        out: &mut ProvisionOutput,
    ) {
        for (name, field) in self.mapping.iter() {
            if let Some(value) = input.fields.get(field) {
                out.add_env_var(name, value.clone());
            }
        }
    }

    async fn deprovision(
        &self,
        _ctx: &ProvisionContext,
        _input: &ProvisionInput,
    ) -> Result<(), ProvisionError> {
        Ok(())
    }
}
