//! Secure environment payload: the map forwarded as `_env_vars` and the
//! providers it is loaded from.

use std::{collections::BTreeMap, env, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Process environment variable holding the JSON-encoded payload.
pub const ENV_VARS_VAR: &str = "BOLT_ENV_VARS";

#[derive(Debug, thiserror::Error)]
pub enum EnvParseError {
    #[error("{var} is not valid JSON: {source}")]
    InvalidJson {
        var: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{var} is not valid UTF-8")]
    NotUnicode { var: String },
    #[error("{var} must be a JSON object, got {found}")]
    NotAnObject { var: String, found: &'static str },
}

/// Decoded secret payload. Values are kept as JSON and never shown by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecureEnvMap(BTreeMap<String, Value>);

impl SecureEnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw payload. `var` only names the source in error messages.
    pub fn parse(var: &str, raw: &str) -> Result<Self, EnvParseError> {
        let value: Value = serde_json::from_str(raw).map_err(|source| EnvParseError::InvalidJson {
            var: var.to_string(),
            source,
        })?;
        match value {
            Value::Object(obj) => Ok(Self(obj.into_iter().collect())),
            other => Err(EnvParseError::NotAnObject {
                var: var.to_string(),
                found: json_kind(&other),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Pairs suitable for a child process environment. Strings pass through
    /// as-is; any other JSON value is exported in its compact JSON form.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().map(|(k, v)| {
            let s = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.as_str(), s)
        })
    }
}

impl fmt::Debug for SecureEnvMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SecureEnvMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Source of the secure payload, injected into the dispatcher.
pub trait SecretProvider {
    fn load(&self) -> Result<SecureEnvMap, EnvParseError>;
}

/// Reads the payload from a process environment variable, once per `load`.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new(ENV_VARS_VAR)
    }
}

impl SecretProvider for EnvSecretProvider {
    fn load(&self) -> Result<SecureEnvMap, EnvParseError> {
        match env::var(&self.var) {
            Ok(raw) => SecureEnvMap::parse(&self.var, &raw),
            Err(env::VarError::NotUnicode(_)) => Err(EnvParseError::NotUnicode { var: self.var.clone() }),
            Err(env::VarError::NotPresent) => Ok(SecureEnvMap::new()),
        }
    }
}

/// Fixed payload, or a fixed raw string to parse. Used by tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    raw: Option<String>,
}

impl StaticSecretProvider {
    pub fn unset() -> Self {
        Self { raw: None }
    }

    pub fn raw(raw: impl Into<String>) -> Self {
        Self { raw: Some(raw.into()) }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn load(&self) -> Result<SecureEnvMap, EnvParseError> {
        match &self.raw {
            Some(raw) => SecureEnvMap::parse(ENV_VARS_VAR, raw),
            None => Ok(SecureEnvMap::new()),
        }
    }
}
