//! Declared plugin options

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    /// Unix seconds or `YYYY-MM-DD`
    Date,
}

impl OptionKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Date => value.is_string() || value.is_i64() || value.is_u64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub key: String,
    pub kind: OptionKind,
    #[serde(default)]
    pub default: Value,
    pub description: String,
}

impl OptionSpec {
    pub fn new(
        key: impl Into<String>,
        kind: OptionKind,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            default,
            description: description.into(),
        }
    }
}

/// Reject unknown keys and values of the wrong type
///
/// `null` is accepted for any key and means "use the default".
pub fn check_against_schema(schema: &[OptionSpec], raw: &Value) -> Result<(), ConfigError> {
    let map = match raw {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::option(
                "<root>",
                format!("options must be an object, got {other}"),
            ));
        }
    };
    for (key, value) in map {
        let Some(spec) = schema.iter().find(|s| &s.key == key) else {
            return Err(ConfigError::option(key.clone(), "unknown option"));
        };
        if !value.is_null() && !spec.kind.accepts(value) {
            return Err(ConfigError::option(
                key.clone(),
                format!("expected {:?}, got {value}", spec.kind),
            ));
        }
    }
    Ok(())
}
