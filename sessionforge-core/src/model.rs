//! Domain model types for Sessionforge.
//!
//! This module defines the core types shared by provisioning and discovery:
//! - [`FieldName`] - Identifier of a credential field (e.g. "Access Key ID")
//! - [`ItemFields`] - The field values of one configured credential item
//! - [`ItemScope`] - Opaque identifier of a credential item instance
//! - [`FieldMapping`] - Fixed table from an external name to a field
//! - [`CachedCredential`] - A derived short-lived credential with its expiry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::store::Secret;

/// Identifier of a field within a credential item.
///
/// The well-known fields are available as associated constants.
///
/// # Examples
///
/// ```
/// use sessionforge_core::FieldName;
///
/// let token = FieldName::TOKEN;
/// assert_eq!(token.as_str(), "Token");
/// assert_eq!(FieldName::new("Token"), token);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(Cow<'static, str>);

impl FieldName {
    pub const ACCESS_KEY_ID: FieldName = FieldName(Cow::Borrowed("Access Key ID"));
    pub const SECRET_ACCESS_KEY: FieldName = FieldName(Cow::Borrowed("Secret Access Key"));
    pub const DEFAULT_REGION: FieldName = FieldName(Cow::Borrowed("Default Region"));
    pub const TOKEN: FieldName = FieldName(Cow::Borrowed("Token"));
    pub const ADDRESS: FieldName = FieldName(Cow::Borrowed("Address"));
    pub const EMAIL: FieldName = FieldName(Cow::Borrowed("Email"));

    /// Create a field name from an arbitrary string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Get the field name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Field values of a single credential item.
///
/// Values are wrapped in [`Secret`] so that printing an item never leaks
/// its contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemFields(BTreeMap<FieldName, Secret>);

impl ItemFields {
    /// Create an empty set of fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, name: FieldName, value: impl Into<Secret>) {
        self.0.insert(name, value.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, name: FieldName, value: impl Into<Secret>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a field value if the field is present.
    pub fn get(&self, name: &FieldName) -> Option<&Secret> {
        self.0.get(name)
    }

    /// Get a field value only if it is present and non-empty.
    pub fn get_non_empty(&self, name: &FieldName) -> Option<&Secret> {
        self.get(name).filter(|value| !value.expose().is_empty())
    }

    pub fn contains(&self, name: &FieldName) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Secret)> {
        self.0.iter()
    }
}

impl<V: Into<Secret>> FromIterator<(FieldName, V)> for ItemFields {
    fn from_iter<I: IntoIterator<Item = (FieldName, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Identifier of one configured credential item.
///
/// Cache entries are partitioned by scope: two items never observe each
/// other's cached values, even under the same logical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemScope(String);

impl ItemScope {
    /// Create a scope from a caller-supplied item identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a scope with a fresh random identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemScope {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemScope {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Fixed, ordered table from an external name to a field.
///
/// Used for environment variable names (`NIRMATA_TOKEN` → Token) as well as
/// for config-file keys (`token` → Token). The table is built once and then
/// handed by value to whatever consumes it.
///
/// # Examples
///
/// ```
/// use sessionforge_core::{FieldMapping, FieldName};
///
/// let mapping = FieldMapping::new()
///     .with("NIRMATA_TOKEN", FieldName::TOKEN)
///     .with("NIRMATA_URL", FieldName::ADDRESS);
///
/// assert_eq!(mapping.name_for(&FieldName::TOKEN), Some("NIRMATA_TOKEN"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, FieldName)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A later entry for the same external name replaces the earlier one.
    pub fn with(mut self, name: impl Into<String>, field: FieldName) -> Self {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, field));
        self
    }

    /// Iterate over `(external name, field)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldName)> {
        self.entries.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// External name mapped to the given field, if any.
    pub fn name_for(&self, field: &FieldName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, f)| f == field)
            .map(|(name, _)| name.as_str())
    }

    pub fn field_for(&self, name: &str) -> Option<&FieldName> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, field)| field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, FieldName)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (S, FieldName)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |mapping, (name, field)| mapping.with(name, field))
    }
}

/// A derived short-lived credential as returned by the exchange mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Secret,
    pub expires_at: DateTime<Utc>,
}

impl CachedCredential {
    /// Check whether the credential may still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
