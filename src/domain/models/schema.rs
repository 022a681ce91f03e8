//! Declarative config schemas for actions and reactions.
//!
//! Each action and reaction declares the shape of its config map: which
//! keys are required, their types, and range/shape constraints. Automations
//! are validated against these schemas before the engine acts on them, and
//! again defensively at trigger time.

use serde_json::{Map, Value};

/// Scalar type expected for a config field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    StringList,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::StringList => "list of strings",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// Extra shape constraint applied to string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// `owner/repo`, both halves non-empty, limited charset.
    RepoFullName,
    /// A plausible email address.
    Email,
}

impl FieldShape {
    fn check(&self, value: &str) -> bool {
        match self {
            Self::RepoFullName => {
                let mut parts = value.splitn(2, '/');
                match (parts.next(), parts.next()) {
                    (Some(owner), Some(repo)) => {
                        !owner.is_empty()
                            && !repo.is_empty()
                            && !repo.contains('/')
                            && owner.chars().all(is_repo_char)
                            && repo.chars().all(is_repo_char)
                    }
                    _ => false,
                }
            }
            Self::Email => {
                let mut parts = value.splitn(2, '@');
                match (parts.next(), parts.next()) {
                    (Some(local), Some(domain)) => {
                        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                    }
                    _ => false,
                }
            }
        }
    }
}

fn is_repo_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// One field of a config schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Inclusive integer bounds, for [`FieldType::Integer`] fields.
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub shape: Option<FieldShape>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type, required: true, min: None, max: None, shape: None }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type, required: false, min: None, max: None, shape: None }
    }

    pub const fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub const fn with_shape(mut self, shape: FieldShape) -> Self {
        self.shape = Some(shape);
        self
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.field_type.matches(value) {
            return Err(format!(
                "field '{}' must be a {}",
                self.name,
                self.field_type.as_str()
            ));
        }
        if let Some(n) = value.as_i64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(format!("field '{}' must be >= {min}", self.name));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(format!("field '{}' must be <= {max}", self.name));
                }
            }
        }
        if let (Some(shape), Some(s)) = (self.shape, value.as_str()) {
            if !shape.check(s) {
                return Err(format!("field '{}' has an invalid format", self.name));
            }
        }
        Ok(())
    }
}

/// Declarative description of a config map: required/typed keys, closed
/// key set (unknown keys are rejected).
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    pub fields: &'static [FieldSpec],
}

impl ConfigSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Validate a config object against this schema.
    ///
    /// Returns the first violation found; `config` must be a JSON object.
    pub fn validate(&self, config: &Value) -> Result<(), String> {
        let map: &Map<String, Value> = config
            .as_object()
            .ok_or_else(|| "config must be an object".to_string())?;

        for spec in self.fields {
            match map.get(spec.name) {
                Some(value) => spec.validate(value)?,
                None if spec.required => {
                    return Err(format!("missing required field '{}'", spec.name));
                }
                None => {}
            }
        }

        for key in map.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                return Err(format!("unknown field '{key}'"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TIMER: ConfigSchema = ConfigSchema::new(&[
        FieldSpec::required("hour", FieldType::Integer).with_range(0, 23),
        FieldSpec::required("minute", FieldType::Integer).with_range(0, 59),
    ]);

    const REPO: ConfigSchema = ConfigSchema::new(&[
        FieldSpec::required("repository", FieldType::String).with_shape(FieldShape::RepoFullName),
        FieldSpec::optional("labels", FieldType::StringList),
    ]);

    #[test]
    fn test_valid_timer_config() {
        assert!(TIMER.validate(&json!({"hour": 14, "minute": 30})).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = TIMER.validate(&json!({"hour": 14})).unwrap_err();
        assert!(err.contains("minute"));
    }

    #[test]
    fn test_out_of_range() {
        assert!(TIMER.validate(&json!({"hour": 24, "minute": 0})).is_err());
        assert!(TIMER.validate(&json!({"hour": 23, "minute": 60})).is_err());
        assert!(TIMER.validate(&json!({"hour": -1, "minute": 0})).is_err());
    }

    #[test]
    fn test_wrong_type() {
        let err = TIMER
            .validate(&json!({"hour": "fourteen", "minute": 30}))
            .unwrap_err();
        assert!(err.contains("integer"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = TIMER
            .validate(&json!({"hour": 1, "minute": 2, "second": 3}))
            .unwrap_err();
        assert!(err.contains("second"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(TIMER.validate(&json!([1, 2])).is_err());
        assert!(TIMER.validate(&json!("x")).is_err());
    }

    #[test]
    fn test_repo_full_name_shape() {
        assert!(REPO.validate(&json!({"repository": "octo/site"})).is_ok());
        assert!(REPO.validate(&json!({"repository": "octo"})).is_err());
        assert!(REPO.validate(&json!({"repository": "octo/"})).is_err());
        assert!(REPO.validate(&json!({"repository": "a/b/c"})).is_err());
        assert!(REPO.validate(&json!({"repository": "bad name/repo"})).is_err());
    }

    #[test]
    fn test_string_list_field() {
        assert!(REPO
            .validate(&json!({"repository": "o/r", "labels": ["bug", "p1"]}))
            .is_ok());
        assert!(REPO
            .validate(&json!({"repository": "o/r", "labels": ["bug", 3]}))
            .is_err());
    }

    #[test]
    fn test_email_shape() {
        const MAIL: ConfigSchema = ConfigSchema::new(&[
            FieldSpec::required("recipient", FieldType::String).with_shape(FieldShape::Email),
        ]);
        assert!(MAIL.validate(&json!({"recipient": "u@x.io"})).is_ok());
        assert!(MAIL.validate(&json!({"recipient": "u@x"})).is_err());
        assert!(MAIL.validate(&json!({"recipient": "not-an-email"})).is_err());
    }
}
