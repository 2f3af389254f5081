//! Built-in credential types.
//!
//! - Nirmata API token: provisioned as plain environment variables and
//!   discoverable from the environment and `~/.nirmata/config`
//! - AWS access key: provisioned as temporary STS credentials, see
//!   [`StsProvisioner`](crate::provision::StsProvisioner)

use crate::discovery::{ConfigFileImporter, DiscoveryChain, EnvVarPairImporter};
use crate::model::{FieldMapping, FieldName};
use crate::provision::EnvVarProvisioner;

/// Location of the Nirmata CLI configuration.
pub const NIRMATA_CONFIG_PATH: &str = "~/.nirmata/config";

/// Environment variables understood by the Nirmata CLI.
pub fn nirmata_env_mapping() -> FieldMapping {
    FieldMapping::new()
        .with("NIRMATA_TOKEN", FieldName::TOKEN)
        .with("NIRMATA_URL", FieldName::ADDRESS)
}

/// Keys read from each section of the Nirmata config file.
///
/// The file also carries an `email` key. It is not imported.
pub fn nirmata_config_keys() -> FieldMapping {
    FieldMapping::new()
        .with("address", FieldName::ADDRESS)
        .with("token", FieldName::TOKEN)
}

/// Discovery chain for Nirmata API tokens: environment first, then config file.
pub fn nirmata_discovery_chain() -> DiscoveryChain {
    DiscoveryChain::new(FieldName::TOKEN)
        .with(EnvVarPairImporter::new(nirmata_env_mapping(), FieldName::TOKEN))
        .with(ConfigFileImporter::new(
            NIRMATA_CONFIG_PATH,
            nirmata_config_keys(),
            FieldName::TOKEN,
        ))
}

/// Default provisioner for Nirmata API tokens.
pub fn nirmata_provisioner() -> EnvVarProvisioner {
    EnvVarProvisioner::new(nirmata_env_mapping())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::Provisioner;

    #[test]
    fn test_config_keys_skip_email() {
        assert_eq!(nirmata_config_keys().field_for("email"), None);
        assert_eq!(nirmata_config_keys().field_for("token"), Some(&FieldName::TOKEN));
    }

    #[test]
    fn test_chain_has_env_then_file() {
        let chain = nirmata_discovery_chain();
        assert_eq!(chain.len(), 2);
        let debug = format!("{:?}", chain);
        let env_pos = debug.find("environment").unwrap();
        let file_pos = debug.find(NIRMATA_CONFIG_PATH).unwrap();
        assert!(env_pos < file_pos);
    }

    #[test]
    fn test_provisioner_uses_same_names() {
        assert_eq!(
            nirmata_provisioner().description(),
            "Provision environment variables NIRMATA_TOKEN, NIRMATA_URL"
        );
    }
}
