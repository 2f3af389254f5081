//! # Sessionforge Core
//!
//! Core library for Sessionforge credential provisioning.
//!
//! This crate provides:
//! - Domain types for credential items, fields, and derived credentials
//! - A scoped, expiry-aware credential cache with memory and file backends
//! - The contract for exchanging long-lived secrets for temporary credentials
//! - Provisioners that turn credential items into environment variables
//! - A discovery chain that finds candidate credentials in ambient sources
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sessionforge_core::{
//!     CredentialStore, ItemFields, ProvisionContext, ProvisionInput,
//!     ProvisionOutput, Provisioner, StsProvisioner,
//! };
//!
//! async fn env_for(exchange: Arc<dyn sessionforge_core::ExchangeClient>, fields: ItemFields) {
//!     let provisioner = StsProvisioner::new(exchange, CredentialStore::in_memory());
//!     let mut out = ProvisionOutput::new();
//!     provisioner
//!         .provision(&ProvisionContext::new(), &ProvisionInput::new("aws-prod", fields), &mut out)
//!         .await;
//! }
//! ```

pub mod clock;
pub mod discovery;
pub mod exchange;
pub mod model;
pub mod presets;
pub mod provision;
pub mod store;

// Re-export commonly used types at crate root
pub use model::{
    CachedCredential,
    FieldMapping,
    FieldName,
    ItemFields,
    ItemScope,
};

pub use store::{
    CacheBackend,
    CredentialStore,
    FileStore,
    MemoryStore,
    Secret,
    StoreError,
    create_store,
};

pub use exchange::{
    ExchangeClient,
    ExchangeError,
    ExchangeErrorKind,
    ExchangeOutput,
    ExchangeSession,
    SessionError,
    SessionTokenRequest,
    StaticCredentials,
};

pub use provision::{
    EnvVarProvisioner,
    ProvisionContext,
    ProvisionError,
    ProvisionInput,
    ProvisionOutput,
    Provisioner,
    StsProvisioner,
};

pub use discovery::{
    DiscoveryChain,
    DiscoveryError,
    ImportAttempt,
    ImportCandidate,
    ImportContext,
    Importer,
};
