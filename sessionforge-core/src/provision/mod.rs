//! Provisioning of environment variables from credential items.
//!
//! This module provides:
//! - [`Provisioner`] - Trait implemented by every provisioning strategy
//! - [`ProvisionContext`] - Cancellation and deadline for one call
//! - [`ProvisionInput`] / [`ProvisionOutput`] - Per-call input and result
//! - [`StsProvisioner`] - Derives and caches short-lived session credentials
//! - [`EnvVarProvisioner`] - Exposes item fields directly as environment variables
//!
//! # Outcome
//!
//! A call ends with either a set of environment assignments or a single
//! error. Assignments that do not depend on the outcome (such as the region)
//! may be present alongside an error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::exchange::{ExchangeError, ExchangeErrorKind, IncompleteOutput, SessionError};
use crate::model::{ItemFields, ItemScope};
use crate::store::Secret;

mod env_vars;
mod sts;

pub use env_vars::EnvVarProvisioner;
pub use sts::{
    AWS_ACCESS_KEY_ID, AWS_DEFAULT_REGION, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN,
    STS_CACHE_KEY, StsProvisioner,
};

/// Error terminating a provisioning call.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The long-lived credentials could not be used to open a session.
    #[error("could not start STS session: {0}")]
    Session(#[from] SessionError),

    /// The exchange endpoint's region is disabled for this account.
    #[error("RegionDisabledException: {source}")]
    RegionDisabled { source: ExchangeError },

    /// Any other exchange failure, passed through untouched.
    #[error(transparent)]
    Exchange(ExchangeError),

    /// The exchange mechanism broke its own contract.
    #[error("internal error: {0}")]
    Internal(#[from] IncompleteOutput),
}

impl ProvisionError {
    /// Classify a raw exchange failure.
    pub fn from_exchange(err: ExchangeError) -> Self {
        match err.kind() {
            ExchangeErrorKind::RegionDisabled => Self::RegionDisabled { source: err },
            _ => Self::Exchange(err),
        }
    }
}

/// Per-call context: cancellation signal and optional deadline.
#[derive(Debug, Clone, Default)]
pub struct ProvisionContext {
    /// Cancelling this token aborts any in-flight exchange call.
    pub cancellation: CancellationToken,
    /// Upper bound on the exchange call.
    pub timeout: Option<Duration>,
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default cancellation token with the provided one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Input of one provisioning call.
#[derive(Debug, Clone)]
pub struct ProvisionInput {
    /// Identifies the item; cache entries are partitioned by it.
    pub item: ItemScope,
    pub fields: ItemFields,
}

impl ProvisionInput {
    pub fn new(item: impl Into<ItemScope>, fields: ItemFields) -> Self {
        Self {
            item: item.into(),
            fields,
        }
    }
}

/// Result of one provisioning call.
#[derive(Debug, Default)]
pub struct ProvisionOutput {
    env: BTreeMap<String, Secret>,
    error: Option<ProvisionError>,
}

impl ProvisionOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for the consuming process.
    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<Secret>) {
        self.env.insert(name.into(), value.into());
    }

    /// Record the terminal error. Only the first error is kept.
    pub fn add_error(&mut self, error: ProvisionError) {
        if let Some(existing) = &self.error {
            tracing::debug!(existing = %existing, dropped = %error, "provision output already has an error");
            return;
        }
        self.error = Some(error);
    }

    pub fn env_vars(&self) -> &BTreeMap<String, Secret> {
        &self.env
    }

    pub fn env_var(&self, name: &str) -> Option<&Secret> {
        self.env.get(name)
    }

    pub fn error(&self) -> Option<&ProvisionError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the environment assignments and the terminal error, if any.
    pub fn into_parts(self) -> (BTreeMap<String, Secret>, Option<ProvisionError>) {
        (self.env, self.error)
    }

    /// Assignments on success, the error otherwise.
    pub fn into_result(self) -> Result<BTreeMap<String, Secret>, ProvisionError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.env),
        }
    }
}

/// A strategy for turning a credential item into environment variables.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Human-readable summary of what this provisioner sets.
    fn description(&self) -> &str;

    /// Populate `out` for the given item.
    async fn provision(
        &self,
        ctx: &ProvisionContext,
        input: &ProvisionInput,
        out: &mut ProvisionOutput,
    );

    /// Undo a previous [`provision`](Self::provision).
    async fn deprovision(
        &self,
        ctx: &ProvisionContext,
        input: &ProvisionInput,
    ) -> Result<(), ProvisionError>;
}
