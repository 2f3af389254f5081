//! Provisioning of temporary session credentials through the exchange mechanism.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ProvisionContext, ProvisionError, ProvisionInput, ProvisionOutput, Provisioner};
use crate::exchange::{
    ExchangeClient, ExchangeError, ExchangeOutput, ExchangeSession, MIN_SESSION_DURATION,
    SessionError, SessionTokenRequest, StaticCredentials,
};
use crate::model::{CachedCredential, FieldName, ItemFields};
use crate::store::{CredentialStore, Secret};

pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Cache key under which derived credentials are stored for an item.
pub const STS_CACHE_KEY: &str = "sts";

const DESCRIPTION: &str = "Provision environment variables with temporary STS credentials \
     AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN";

/// Provisions temporary session credentials derived from a long-lived key pair.
///
/// On each call:
/// 1. `AWS_DEFAULT_REGION` is set if the item has a default region
/// 2. A cached, unexpired credential for the item is used as is
/// 3. Otherwise a session is opened and a new credential requested for the
///    minimum duration, then cached until its own expiration
///
/// # Example
///
/// ```rust,ignore
/// use sessionforge_core::{CredentialStore, ProvisionContext, ProvisionInput, ProvisionOutput, Provisioner, StsProvisioner};
///
/// let provisioner = StsProvisioner::new(exchange, CredentialStore::in_memory())
///     .with_mfa("arn:aws:iam::123456789012:mfa/alice", "123456");
///
/// let mut out = ProvisionOutput::new();
/// provisioner.provision(&ProvisionContext::new(), &input, &mut out).await;
/// ```
pub struct StsProvisioner {
    exchange: Arc<dyn ExchangeClient>,
    store: CredentialStore,
    mfa_serial: Option<String>,
    totp_code: Option<Secret>,
}

impl StsProvisioner {
    pub fn new(exchange: Arc<dyn ExchangeClient>, store: CredentialStore) -> Self {
        Self {
            exchange,
            store,
            mfa_serial: None,
            totp_code: None,
        }
    }

    /// Attach the second factor forwarded with every exchange request.
    pub fn with_mfa(mut self, serial: impl Into<String>, code: impl Into<Secret>) -> Self {
        self.mfa_serial = Some(serial.into());
        self.totp_code = Some(code.into());
        self
    }

    async fn request_credential(
        &self,
        ctx: &ProvisionContext,
        fields: &ItemFields,
    ) -> Result<CachedCredential, ProvisionError> {
        let credentials = static_credentials(fields)?;
        let session = self.exchange.open_session(credentials).await?;

        let request = SessionTokenRequest {
            duration: MIN_SESSION_DURATION,
            serial_number: self.mfa_serial.clone(),
            token_code: self.totp_code.clone(),
        };

        let output = request_with_context(ctx, session.as_ref(), request)
            .await
            .map_err(ProvisionError::from_exchange)?;

        Ok(output.into_credential()?)
    }
}

#[async_trait]
impl Provisioner for StsProvisioner {
    fn description(&self) -> &str {
        DESCRIPTION
    }

    async fn provision(
        &self,
        ctx: &ProvisionContext,
        input: &ProvisionInput,
        out: &mut ProvisionOutput,
    ) {
        if let Some(region) = input.fields.get(&FieldName::DEFAULT_REGION) {
            out.add_env_var(AWS_DEFAULT_REGION, region.clone());
        }

        if let Some(cached) = self
            .store
            .get::<CachedCredential>(&input.item, STS_CACHE_KEY)
            .await
        {
            tracing::debug!(item = %input.item, expires_at = %cached.expires_at, "Using cached STS credentials");
            emit_credential(out, &cached);
            return;
        }

        tracing::debug!(item = %input.item, "No cached STS credentials, requesting new ones");

        match self.request_credential(ctx, &input.fields).await {
            Ok(credential) => {
                tracing::info!(item = %input.item, expires_at = %credential.expires_at, "Obtained temporary STS credentials");
                emit_credential(out, &credential);
                self.store
                    .put(&input.item, STS_CACHE_KEY, &credential, credential.expires_at)
                    .await;
            }
            Err(e) => {
                tracing::warn!(item = %input.item, error = %e, "Failed to obtain STS credentials");
                out.add_error(e);
            }
        }
    }

    async fn deprovision(
        &self,
        _ctx: &ProvisionContext,
        input: &ProvisionInput,
    ) -> Result<(), ProvisionError> {
        // Environment variables disappear with the consuming process.
        tracing::trace!(item = %input.item, "Nothing to deprovision for STS credentials");
        Ok(())
    }
}

fn static_credentials(fields: &ItemFields) -> Result<StaticCredentials, SessionError> {
    let access_key_id = fields
        .get_non_empty(&FieldName::ACCESS_KEY_ID)
        .ok_or(SessionError::MissingField {
            field: FieldName::ACCESS_KEY_ID,
        })?;
    let secret_access_key = fields
        .get_non_empty(&FieldName::SECRET_ACCESS_KEY)
        .ok_or(SessionError::MissingField {
            field: FieldName::SECRET_ACCESS_KEY,
        })?;

    Ok(StaticCredentials {
        access_key_id: access_key_id.expose().to_string(),
        secret_access_key: secret_access_key.clone(),
    })
}

/// Run an exchange request bounded by the context's cancellation and deadline.
async fn request_with_context(
    ctx: &ProvisionContext,
    session: &dyn ExchangeSession,
    request: SessionTokenRequest,
) -> Result<ExchangeOutput, ExchangeError> {
    let token = ctx.cancellation.child_token();
    // Cancel the session's token however this function exits.
    let _guard = token.clone().drop_guard();

    let call = session.get_session_token(request, token);
    let bounded = async {
        match ctx.timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .unwrap_or(Err(ExchangeError::TimedOut { after })),
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => Err(ExchangeError::Cancelled),
        result = bounded => result,
    }
}

fn emit_credential(out: &mut ProvisionOutput, credential: &CachedCredential) {
    out.add_env_var(AWS_ACCESS_KEY_ID, credential.access_key_id.as_str());
    out.add_env_var(AWS_SECRET_ACCESS_KEY, credential.secret_access_key.clone());
    out.add_env_var(AWS_SESSION_TOKEN, credential.session_token.clone());
}
