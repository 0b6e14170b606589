//! Resource views handed to analyzers.
//!
//! An [`AnalyzerResource`] is an immutable snapshot of one resource's identity
//! and state, built by the engine immediately before an analyzer call and
//! discarded once the call returns.

mod value;


use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::value::{
    PropertyMap, PropertyValue, SECRET_SIGNATURE, SIGNATURE_KEY, UNKNOWN_SENTINEL,
};

/// Separator between URN segments.
const URN_SEPARATOR: &str = "::";

/// Globally unique resource name.
///
/// URNs are opaque to the contract. The final `::`-separated segment is the
/// resource's logical name.
///
/// # Example
///
/// ```
/// use policy_analyzer::Urn;
///
/// let urn = Urn::new("urn:pkg:aws:s3/bucket::my-bucket");
/// assert_eq!(urn.name(), "my-bucket");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Wraps a URN string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the URN text.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the logical name segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(URN_SEPARATOR).next().unwrap_or(self.as_str())
    }

    /// Returns `true` when the URN is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Urn {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Token naming a resource's schema, such as `aws:s3/bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeToken(String);

impl TypeToken {
    /// Wraps a type token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token text.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A resource as exposed to analyzers.
///
/// # Example
///
/// ```
/// use policy_analyzer::{AnalyzerResource, PropertyValue};
///
/// let bucket = AnalyzerResource::new(
///     "urn:pkg:aws:s3/bucket::my-bucket",
///     "aws:s3/bucket",
///     "my-bucket",
/// )
/// .with_property("acl", "public-read");
///
/// assert_eq!(bucket.property("acl").and_then(PropertyValue::as_str), Some("public-read"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResource {
    urn: Urn,
    #[serde(rename = "type")]
    type_token: TypeToken,
    name: String,
    #[serde(default)]
    properties: PropertyMap,
}

impl AnalyzerResource {
    /// Creates a resource with no properties.
    #[must_use]
    pub fn new(urn: impl Into<Urn>, type_token: impl Into<TypeToken>, name: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            type_token: type_token.into(),
            name: name.into(),
            properties: PropertyMap::new(),
        }
    }

    /// Replaces the property map.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    /// Sets a single top-level property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the resource URN.
    #[must_use]
    pub const fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Returns the type token.
    #[must_use]
    pub const fn type_token(&self) -> &TypeToken {
        &self.type_token
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the property map.
    #[must_use]
    pub const fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Looks up a property by dotted path, e.g. `tags.owner`.
    #[must_use]
    pub fn property(&self, path: &str) -> Option<&PropertyValue> {
        path.split_once('.').map_or_else(
            || self.properties.get(path),
            |(head, tail)| self.properties.get(head)?.lookup(tail),
        )
    }
}
