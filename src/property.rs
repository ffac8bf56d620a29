//! Property model
//!
//! A [`Property`] is a named, versioned, possibly multi-valued configuration
//! entry. Its identity is `(key, namespace, environment)`; `revision` orders
//! the history of one identity.

use crate::cipher::{Cipher, SecretKey};
use crate::value::{DecodeError, TypedValue, Value};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace assigned to properties stored without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Separator used to join section paths into a single column.
pub const RECORD_SEPARATOR: &str = "\u{241E}";

/// Deployment context of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Unset; never used as a search predicate
    #[default]
    Default,
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn code(&self) -> i64 {
        match self {
            Environment::Default => 0,
            Environment::Development => 1,
            Environment::Testing => 2,
            Environment::Staging => 3,
            Environment::Production => 4,
        }
    }

    pub fn from_code(code: i64) -> std::result::Result<Self, DecodeError> {
        match code {
            0 => Ok(Environment::Default),
            1 => Ok(Environment::Development),
            2 => Ok(Environment::Testing),
            3 => Ok(Environment::Staging),
            4 => Ok(Environment::Production),
            other => Err(DecodeError::UnknownEnvironment(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Default => "default",
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Environment::Default
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "default" => Ok(Environment::Default),
            "dev" | "development" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Testing),
            "stage" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(Error::InvalidEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A versioned configuration entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    /// Hierarchical section path
    #[serde(default)]
    pub section: Vec<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub environment: Environment,
    /// Ordered; a property may carry several values
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<DateTime<Utc>>,
}

impl Property {
    /// Create a property from natively-typed values.
    pub fn new<S, V>(
        section: impl IntoIterator<Item = S>,
        namespace: impl Into<String>,
        environment: Environment,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self
    where
        S: Into<String>,
        V: Into<TypedValue>,
    {
        Self {
            key: key.into(),
            section: section.into_iter().map(Into::into).collect(),
            namespace: namespace.into(),
            environment,
            values: values.into_iter().map(Value::new).collect(),
            ..Default::default()
        }
    }

    /// Create a property whose values are all flagged as secret.
    pub fn secret<S, V>(
        section: impl IntoIterator<Item = S>,
        namespace: impl Into<String>,
        environment: Environment,
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self
    where
        S: Into<String>,
        V: Into<TypedValue>,
    {
        let mut property = Self::new(section, namespace, environment, key, values);
        property.set_secret(true);
        property
    }

    /// Create a property from dynamically-typed TOML values.
    ///
    /// Fails with a conversion error on the first unsupported value.
    pub fn from_toml_values<'a, S>(
        section: impl IntoIterator<Item = S>,
        namespace: impl Into<String>,
        environment: Environment,
        key: impl Into<String>,
        values: impl IntoIterator<Item = &'a toml::Value>,
    ) -> Result<Self>
    where
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(Value::from_toml)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            key: key.into(),
            section: section.into_iter().map(Into::into).collect(),
            namespace: namespace.into(),
            environment,
            values,
            ..Default::default()
        })
    }

    /// Replace the values, keeping every other field.
    pub fn set_values<V: Into<TypedValue>>(&mut self, values: impl IntoIterator<Item = V>) {
        let secret = self.is_secret();
        self.values = values
            .into_iter()
            .map(|v| Value {
                secret,
                ..Value::new(v)
            })
            .collect();
    }

    pub fn set_secret(&mut self, secret: bool) {
        for value in &mut self.values {
            value.secret = secret;
        }
    }

    /// True when any value requires encryption
    pub fn is_secret(&self) -> bool {
        self.values.iter().any(|v| v.secret)
    }

    /// Reject properties that may not be written.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::MissingKey);
        }
        Ok(())
    }

    /// Section path joined for storage
    pub fn joined_section(&self) -> String {
        self.section.join(RECORD_SEPARATOR)
    }

    pub fn split_section(joined: &str) -> Vec<String> {
        if joined.is_empty() {
            return Vec::new();
        }
        joined.split(RECORD_SEPARATOR).map(str::to_string).collect()
    }

    /// Whether `other` refers to the same `(key, namespace, environment)`.
    pub fn same_identity(&self, other: &Property) -> bool {
        self.key == other.key
            && self.namespace == other.namespace
            && self.environment == other.environment
    }

    /// Encrypt every secret value in place.
    pub fn encrypt(&mut self, cipher: &dyn Cipher, key: &SecretKey) -> Result<()> {
        for value in self.values.iter_mut().filter(|v| v.secret) {
            value.data = cipher
                .encrypt(&value.data, key.as_bytes())
                .map_err(Error::Cipher)?;
        }
        Ok(())
    }

    /// Decrypt every secret value in place.
    pub fn decrypt(&mut self, cipher: &dyn Cipher, key: &SecretKey) -> Result<()> {
        for value in self.values.iter_mut().filter(|v| v.secret) {
            value.data = cipher
                .decrypt(&value.data, key.as_bytes())
                .map_err(Error::Cipher)?;
        }
        Ok(())
    }

    /// Decoded values, in order.
    pub fn typed_values(&self) -> Result<Vec<TypedValue>> {
        self.values
            .iter()
            .map(|v| v.decode().map_err(Error::from))
            .collect()
    }

    /// Short human-readable summary of the values
    pub fn display_values(&self) -> String {
        self.values
            .iter()
            .map(|v| {
                if v.secret {
                    "********".to_string()
                } else {
                    v.data.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compare two value sets.
///
/// Order- and length-sensitive; only the textual data is compared, the
/// declared type is ignored.
pub fn values_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.data == y.data)
}

/// Template-based property search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// Every non-empty/non-zero field becomes an equality predicate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<Property>,
    /// Maximum number of properties returned, 0 means unlimited
    #[serde(default)]
    pub limit: i64,
    /// Search by identity only. Accepted but currently does not alter the
    /// predicate set.
    #[serde(default)]
    pub ignore_value: bool,
}

impl Query {
    pub fn new(template: Property) -> Self {
        Self {
            property: Some(template),
            ..Default::default()
        }
    }

    /// Match every row in a namespace.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self::new(Property {
            namespace: namespace.into(),
            ..Default::default()
        })
    }

    /// Match one identity.
    pub fn identity(key: impl Into<String>, namespace: impl Into<String>, environment: Environment) -> Self {
        Self::new(Property {
            key: key.into(),
            namespace: namespace.into(),
            environment,
            ..Default::default()
        })
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn ignoring_value(mut self) -> Self {
        self.ignore_value = true;
        self
    }
}
