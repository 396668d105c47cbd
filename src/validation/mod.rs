//! Validation of backend-declared fields
//!
//! Rules are registered by name and picked per field from its semantic type.
//! A rule only judges syntax; [`FieldValidator`] layers the required check and
//! the declared-default short circuit on top, so a backend-chosen default is
//! never rejected even when it does not parse.

pub mod rules;

use crate::schema::{FieldDefinition, FieldType};
use rules::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Why a value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Violation {
    #[error("a value is required")]
    Required,
    #[error("must be a whole number")]
    NotInteger,
    #[error("must be a number")]
    NotFloat,
    #[error("must be a duration like 1h30m")]
    InvalidDuration,
    #[error("must be a size like 16Mi")]
    InvalidSize,
    #[error("must be an octal file mode like 0755")]
    InvalidFileMode,
    #[error("must be an ISO-8601 time")]
    InvalidTime,
    #[error("list contains an empty or unterminated item")]
    InvalidList,
    #[error("must be one of: {}", .allowed.join(", "))]
    NotInSet { allowed: Vec<String> },
    #[error("must be true, false or unset")]
    InvalidTristate,
    #[error("must be a rate or a bandwidth timetable")]
    InvalidBwTimetable,
    #[error("must not contain ':' or '/'")]
    InvalidName,
    #[error("is already used by another remote")]
    NameTaken,
}

/// A violation attributed to a named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub violation: Violation,
}

pub trait ValidationRule: Send + Sync {
    /// Syntax check of a non-empty raw value
    fn violation(&self, raw: &str) -> Option<Violation>;
}

/// Form values travel as JSON; rules see their text form
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.iter().map(raw_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// A rule bound to one field's default and required flag
#[derive(Clone)]
pub struct FieldValidator {
    rule: Arc<dyn ValidationRule>,
    default_str: String,
    required: bool,
}

impl FieldValidator {
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn check_raw(&self, raw: &str) -> Option<Violation> {
        let raw = raw.trim();
        if raw.is_empty() {
            return self.required.then_some(Violation::Required);
        }
        if !self.default_str.is_empty() && raw.eq_ignore_ascii_case(self.default_str.trim()) {
            return None;
        }
        self.rule.violation(raw)
    }

    pub fn check(&self, value: &Value) -> Option<Violation> {
        self.check_raw(&raw_text(value))
    }
}

/// Maps rule names to validation rules
pub struct ValidatorRegistry {
    rules: HashMap<String, Arc<dyn ValidationRule>>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::empty();
        registry.register("string", Arc::new(StringRule));
        registry.register("bool", Arc::new(BoolRule));
        registry.register("int", Arc::new(IntRule));
        registry.register("float", Arc::new(FloatRule));
        registry.register("duration", Arc::new(DurationRule));
        registry.register("size_suffix", Arc::new(SizeSuffixRule));
        registry.register("file_mode", Arc::new(FileModeRule));
        registry.register("time", Arc::new(TimeRule));
        registry.register("comma_list", Arc::new(CommaListRule));
        registry.register("space_list", Arc::new(SpaceListRule));
        registry.register("tristate", Arc::new(TristateRule));
        registry.register("bw_timetable", Arc::new(BwTimetableRule));
        registry
    }

    /// Add or replace a rule
    pub fn register(&mut self, name: &str, rule: Arc<dyn ValidationRule>) {
        self.rules.insert(name.to_string(), rule);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ValidationRule>> {
        self.rules.get(name).cloned()
    }

    /// Validator for a semantic type. Enum choices come from the type itself;
    /// unknown rule names fall back to free text.
    pub fn create_from_field_definition(
        &self,
        field_type: &FieldType,
        default_str: &str,
    ) -> FieldValidator {
        let rule: Arc<dyn ValidationRule> = match field_type {
            FieldType::Enum { choices } => Arc::new(EnumRule::new(choices.clone())),
            other => self
                .lookup(other.validator_name())
                .unwrap_or_else(|| Arc::new(StringRule)),
        };
        FieldValidator {
            rule,
            default_str: default_str.to_string(),
            required: false,
        }
    }

    pub fn validator_for(&self, def: &FieldDefinition) -> FieldValidator {
        self.create_from_field_definition(&def.field_type, &def.default_str)
            .required(def.required)
    }

    /// Validate every field visible for `provider`; missing values count as empty
    pub fn validate_fields(
        &self,
        defs: &[FieldDefinition],
        values: &Map<String, Value>,
        provider: Option<&str>,
    ) -> Vec<FieldViolation> {
        defs.iter()
            .filter(|def| !def.hidden && def.visible_for(provider))
            .filter_map(|def| {
                let value = values.get(&def.name).unwrap_or(&Value::Null);
                self.validator_for(def).check(value).map(|violation| FieldViolation {
                    field: def.name.clone(),
                    violation,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(raw: Value) -> FieldDefinition {
        FieldDefinition::from_rclone(&raw).unwrap()
    }

    #[test]
    fn test_required_without_default() {
        let registry = ValidatorRegistry::default();
        let def = field(json!({"Name": "client_id", "Type": "string", "Required": true}));
        let validator = registry.validator_for(&def);

        assert_eq!(validator.check(&Value::Null), Some(Violation::Required));
        assert_eq!(validator.check(&json!("  ")), Some(Violation::Required));
        assert_eq!(validator.check(&json!("abc")), None);

        let def = field(json!({"Name": "transfers", "Type": "int", "Required": true}));
        let validator = registry.validator_for(&def);
        assert_eq!(validator.check(&json!("")), Some(Violation::Required));
        assert_eq!(validator.check(&json!(8)), None);
    }

    #[test]
    fn test_declared_default_short_circuits() {
        let registry = ValidatorRegistry::default();
        let cases = [
            (FieldType::Int, "none"),
            (FieldType::Float, "auto"),
            (FieldType::Duration, "Forever"),
            (FieldType::SizeSuffix, "unlimited"),
            (FieldType::Time, "never"),
        ];
        for (field_type, default) in cases {
            let validator = registry.create_from_field_definition(&field_type, default);
            assert_eq!(validator.check_raw(&default.to_uppercase()), None, "{:?}", field_type);
            assert!(validator.check_raw("garbage!").is_some(), "{:?}", field_type);
        }

        let list = registry.create_from_field_definition(
            &FieldType::List {
                separator: crate::schema::ListSeparator::Comma,
            },
            "a,,b",
        );
        assert_eq!(list.check_raw("A,,B"), None);
        assert_eq!(list.check_raw("x,,y"), Some(Violation::InvalidList));
    }

    #[test]
    fn test_enum_uses_type_choices() {
        let registry = ValidatorRegistry::default();
        let validator = registry.create_from_field_definition(
            &FieldType::Enum {
                choices: vec!["off".into(), "writes".into()],
            },
            "off",
        );
        assert_eq!(validator.check(&json!("writes")), None);
        assert!(matches!(
            validator.check(&json!("full")),
            Some(Violation::NotInSet { .. })
        ));
    }

    #[test]
    fn test_register_overrides_rule() {
        struct Never;
        impl ValidationRule for Never {
            fn violation(&self, _raw: &str) -> Option<Violation> {
                Some(Violation::InvalidTime)
            }
        }
        let mut registry = ValidatorRegistry::empty();
        assert!(registry.lookup("int").is_none());
        registry.register("int", Arc::new(Never));
        let validator = registry.create_from_field_definition(&FieldType::Int, "");
        assert_eq!(validator.check_raw("1"), Some(Violation::InvalidTime));

        // unknown names validate as free text
        let validator = registry.create_from_field_definition(&FieldType::Duration, "");
        assert_eq!(validator.check_raw("whatever"), None);
    }

    #[test]
    fn test_validate_fields_respects_provider() {
        let registry = ValidatorRegistry::default();
        let defs = vec![
            field(json!({"Name": "region", "Type": "string", "Required": true, "Provider": "AWS"})),
            field(json!({"Name": "chunk_size", "Type": "SizeSuffix", "DefaultStr": "5Mi"})),
        ];
        let mut values = Map::new();
        values.insert("chunk_size".into(), json!("lots"));

        let violations = registry.validate_fields(&defs, &values, Some("Minio"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "chunk_size");

        let violations = registry.validate_fields(&defs, &values, Some("AWS"));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].violation, Violation::Required);
    }
}
