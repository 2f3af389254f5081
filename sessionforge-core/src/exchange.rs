//! Contract with the exchange mechanism.
//!
//! The exchange mechanism converts long-lived secret material into a
//! short-lived derived credential. Its wire protocol is not part of this
//! crate; integrations implement [`ExchangeClient`] and [`ExchangeSession`].
//!
//! This module provides:
//! - [`StaticCredentials`] - The long-lived key pair used to open a session
//! - [`SessionTokenRequest`] - Parameters of one exchange call
//! - [`ExchangeOutput`] - The raw result reported by the mechanism
//! - [`SessionError`] / [`ExchangeError`] - Failures at each step

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{CachedCredential, FieldName};
use crate::store::Secret;

/// Service error code signalling that the exchange endpoint's region is disabled.
pub const REGION_DISABLED_CODE: &str = "RegionDisabledException";

/// Smallest session duration the exchange mechanism accepts.
pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(900);

/// Error establishing a session from the long-lived credentials.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A field needed to authenticate is absent or empty.
    #[error("missing required field '{field}'")]
    MissingField { field: FieldName },

    /// The mechanism refused to set up a session.
    #[error("{message}")]
    Rejected { message: String },
}

/// Error returned by an exchange call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The service rejected the request with an error code.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The caller cancelled the request.
    #[error("exchange request cancelled")]
    Cancelled,

    /// The request did not finish within the caller's deadline.
    #[error("exchange request timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration },

    /// The request never reached the service or the reply was unusable.
    #[error("{message}")]
    Transport { message: String },
}

/// Classification of an [`ExchangeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeErrorKind {
    RegionDisabled,
    Rejected,
    Cancelled,
    TimedOut,
    Transport,
}

impl ExchangeError {
    /// Shorthand for a service rejection.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ExchangeErrorKind {
        match self {
            Self::Service { code, .. } if code == REGION_DISABLED_CODE => {
                ExchangeErrorKind::RegionDisabled
            }
            Self::Service { .. } => ExchangeErrorKind::Rejected,
            Self::Cancelled => ExchangeErrorKind::Cancelled,
            Self::TimedOut { .. } => ExchangeErrorKind::TimedOut,
            Self::Transport { .. } => ExchangeErrorKind::Transport,
        }
    }
}

/// Long-lived key pair used to authenticate against the exchange mechanism.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
}

/// Parameters of a single exchange call.
///
/// The second-factor values are forwarded exactly as supplied by the caller.
#[derive(Debug, Clone)]
pub struct SessionTokenRequest {
    pub duration: Duration,
    pub serial_number: Option<String>,
    pub token_code: Option<Secret>,
}

/// Result of a successful exchange call, as reported by the mechanism.
///
/// Field names follow the `credential_process` JSON convention
/// (`AccessKeyId`, `SecretAccessKey`, `SessionToken`, `Expiration`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExchangeOutput {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<Secret>,
    pub session_token: Option<Secret>,
    pub expiration: Option<DateTime<Utc>>,
}

/// The mechanism reported success but left out part of the credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exchange reported success without {missing}")]
pub struct IncompleteOutput {
    pub missing: &'static str,
}

impl ExchangeOutput {
    /// Convert into a credential, checking that every part is present.
    pub fn into_credential(self) -> Result<CachedCredential, IncompleteOutput> {
        let access_key_id = self
            .access_key_id
            .ok_or(IncompleteOutput { missing: "an access key id" })?;
        let secret_access_key = self
            .secret_access_key
            .ok_or(IncompleteOutput { missing: "a secret access key" })?;
        let session_token = self
            .session_token
            .ok_or(IncompleteOutput { missing: "a session token" })?;
        let expires_at = self
            .expiration
            .ok_or(IncompleteOutput { missing: "an expiration" })?;

        Ok(CachedCredential {
            access_key_id,
            secret_access_key,
            session_token,
            expires_at,
        })
    }
}

/// Opens sessions with the exchange mechanism.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Authenticate with long-lived credentials.
    async fn open_session(
        &self,
        credentials: StaticCredentials,
    ) -> Result<Box<dyn ExchangeSession>, SessionError>;
}

/// An authenticated session able to issue derived credentials.
#[async_trait]
pub trait ExchangeSession: Send + Sync {
    /// Request a short-lived credential.
    ///
    /// Implementations must return promptly with [`ExchangeError::Cancelled`]
    /// once `cancellation` fires.
    async fn get_session_token(
        &self,
        request: SessionTokenRequest,
        cancellation: CancellationToken,
    ) -> Result<ExchangeOutput, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_disabled_kind() {
        let err = ExchangeError::service(REGION_DISABLED_CODE, "STS is not activated in this region");
        assert_eq!(err.kind(), ExchangeErrorKind::RegionDisabled);

        let err = ExchangeError::service("AccessDenied", "MultiFactorAuthentication failed");
        assert_eq!(err.kind(), ExchangeErrorKind::Rejected);
        assert_eq!(err.to_string(), "AccessDenied: MultiFactorAuthentication failed");
    }

    #[test]
    fn test_other_kinds() {
        assert_eq!(ExchangeError::Cancelled.kind(), ExchangeErrorKind::Cancelled);
        assert_eq!(
            ExchangeError::TimedOut { after: Duration::from_secs(30) }.to_string(),
            "exchange request timed out after 30s"
        );
        assert_eq!(
            ExchangeError::Transport { message: "connection reset".into() }.kind(),
            ExchangeErrorKind::Transport
        );
    }

    #[test]
    fn test_output_deserializes_credential_process_json() {
        let output: ExchangeOutput = serde_json::from_str(
            r#"{
                "Version": 1,
                "AccessKeyId": "ASIAEXAMPLE",
                "SecretAccessKey": "secret",
                "SessionToken": "token",
                "Expiration": "2030-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        let credential = output.into_credential().unwrap();
        assert_eq!(credential.access_key_id, "ASIAEXAMPLE");
        assert_eq!(credential.session_token.expose(), "token");
    }

    #[test]
    fn test_incomplete_output() {
        let output = ExchangeOutput {
            access_key_id: Some("ASIA".into()),
            secret_access_key: Some(Secret::new("secret")),
            session_token: None,
            expiration: Some(Utc::now()),
        };

        let err = output.into_credential().unwrap_err();
        assert_eq!(err.missing, "a session token");
    }
}
