//! Backend-declared field schemas
//!
//! The set of configurable options is not known at build time: every storage
//! backend type and every operation kind publishes its own list through the
//! rclone option JSON format. Each option is decoded into a [`FieldDefinition`]
//! whose [`FieldType`] selects the validation rule used for it.

pub mod cache;

pub use cache::SchemaCache;

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator used by list-valued fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListSeparator {
    Comma,
    Space,
}

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Password,
    Int,
    Float,
    Bool,
    Duration,
    SizeSuffix,
    FileMode,
    Time,
    List { separator: ListSeparator },
    Tristate,
    BwTimetable,
    Enum { choices: Vec<String> },
    Other { name: String },
}

impl FieldType {
    /// Map an rclone option type name onto a semantic type
    pub fn from_rclone(
        type_name: &str,
        is_password: bool,
        exclusive: bool,
        examples: &[FieldExample],
    ) -> Self {
        if is_password {
            return FieldType::Password;
        }
        if exclusive && !examples.is_empty() && type_name != "bool" {
            return FieldType::Enum {
                choices: examples.iter().map(|e| e.value.clone()).collect(),
            };
        }
        match type_name {
            "string" | "" => FieldType::String,
            "bool" => FieldType::Bool,
            "int" | "int64" | "int32" | "uint32" | "uint64" => FieldType::Int,
            "float64" => FieldType::Float,
            "Duration" => FieldType::Duration,
            "SizeSuffix" => FieldType::SizeSuffix,
            "FileMode" => FieldType::FileMode,
            "Time" => FieldType::Time,
            "CommaSepList" | "stringArray" => FieldType::List {
                separator: ListSeparator::Comma,
            },
            "SpaceSepList" => FieldType::List {
                separator: ListSeparator::Space,
            },
            "Tristate" => FieldType::Tristate,
            "BwTimetable" => FieldType::BwTimetable,
            other => FieldType::Other {
                name: other.to_string(),
            },
        }
    }

    /// Registry key of the validation rule for this type
    pub fn validator_name(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Password | FieldType::Other { .. } => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Duration => "duration",
            FieldType::SizeSuffix => "size_suffix",
            FieldType::FileMode => "file_mode",
            FieldType::Time => "time",
            FieldType::List {
                separator: ListSeparator::Comma,
            } => "comma_list",
            FieldType::List {
                separator: ListSeparator::Space,
            } => "space_list",
            FieldType::Tristate => "tristate",
            FieldType::BwTimetable => "bw_timetable",
            FieldType::Enum { .. } => "enum",
        }
    }
}

/// Example value offered by the backend for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldExample {
    pub value: String,
    #[serde(default)]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// One configurable option declared by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub help: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub default_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sensitive: bool,
    /// Provider visibility rule: `"A,B"` shows the field only for those
    /// providers, `"!A,B"` hides it for them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub examples: Vec<FieldExample>,
}

/// rclone option JSON as returned by `config/providers` and `options/info`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawOption {
    name: String,
    field_name: String,
    help: String,
    #[serde(rename = "Type")]
    type_name: String,
    default: Value,
    default_str: String,
    value: Value,
    required: bool,
    advanced: bool,
    is_password: bool,
    sensitive: bool,
    hide: Value,
    exclusive: bool,
    provider: Option<String>,
    examples: Option<Vec<RawExample>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawExample {
    value: Value,
    help: String,
    provider: Option<String>,
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl FieldDefinition {
    /// Decode one rclone option object
    pub fn from_rclone(raw: &Value) -> AppResult<Self> {
        let raw: RawOption = serde_json::from_value(raw.clone())?;
        // options/info uses FieldName for nested blocks, Name for the flag
        let name = if raw.name.is_empty() {
            raw.field_name.clone()
        } else {
            raw.name.clone()
        };
        if name.is_empty() {
            return Err(AppError::SchemaLoad("option without a name".to_string()));
        }

        let examples: Vec<FieldExample> = raw
            .examples
            .unwrap_or_default()
            .into_iter()
            .map(|e| FieldExample {
                value: value_to_text(&e.value),
                help: e.help,
                provider: e.provider.and_then(non_empty),
            })
            .collect();

        let field_type =
            FieldType::from_rclone(&raw.type_name, raw.is_password, raw.exclusive, &examples);

        let default_str = if raw.default_str.is_empty() {
            value_to_text(&raw.default)
        } else {
            raw.default_str
        };

        let hidden = match &raw.hide {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_u64().unwrap_or(0) != 0,
            _ => false,
        };

        Ok(Self {
            name,
            help: raw.help,
            field_type,
            default: raw.default,
            default_str,
            value: if raw.value.is_null() {
                None
            } else {
                Some(raw.value)
            },
            required: raw.required,
            advanced: raw.advanced,
            hidden,
            sensitive: raw.sensitive || raw.is_password,
            provider: raw.provider.and_then(non_empty),
            examples,
        })
    }

    /// Decode a list of rclone options, skipping entries that fail to decode
    pub fn list_from_rclone(raw: &Value) -> Vec<Self> {
        raw.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match Self::from_rclone(item) {
                        Ok(def) => Some(def),
                        Err(e) => {
                            tracing::debug!("Skipping undecodable option: {}", e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_bool(&self) -> bool {
        self.field_type == FieldType::Bool
    }

    /// Whether the field applies to the selected provider
    pub fn visible_for(&self, provider: Option<&str>) -> bool {
        let rule = match self.provider.as_deref().map(str::trim) {
            None | Some("") => return true,
            Some(rule) => rule,
        };
        let (negated, list) = match rule.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, rule),
        };
        let listed = provider
            .map(|p| list.split(',').any(|item| item.trim().eq_ignore_ascii_case(p)))
            .unwrap_or(false);
        if negated {
            !listed
        } else {
            listed
        }
    }

    /// Typed schema default used to seed an editable form
    pub fn initial_value(&self) -> Value {
        match self.field_type {
            FieldType::Bool => match &self.default {
                Value::Bool(b) => Value::Bool(*b),
                _ => Value::Bool(self.default_str.eq_ignore_ascii_case("true")),
            },
            FieldType::Int | FieldType::Float => match &self.default {
                Value::Number(n) => Value::Number(n.clone()),
                _ => self
                    .default_str
                    .parse::<serde_json::Number>()
                    .map(Value::Number)
                    .unwrap_or_else(|_| Value::String(self.default_str.clone())),
            },
            _ => Value::String(self.default_str.clone()),
        }
    }
}

/// A storage backend type offered by `config/providers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendType {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub options: Vec<FieldDefinition>,
}

impl BackendType {
    pub fn from_rclone(raw: &Value) -> AppResult<Self> {
        let name = raw
            .get("Name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::SchemaLoad("provider without a name".to_string()))?;
        Ok(Self {
            name: name.to_string(),
            description: raw
                .get("Description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            prefix: raw
                .get("Prefix")
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string(),
            options: raw
                .get("Options")
                .map(FieldDefinition::list_from_rclone)
                .unwrap_or_default(),
        })
    }

    /// Provider choices declared by the backend's `provider` field, if any
    pub fn provider_choices(&self) -> Vec<String> {
        self.options
            .iter()
            .find(|o| o.name == "provider")
            .map(|o| o.examples.iter().map(|e| e.value.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s3_region() -> Value {
        json!({
            "Name": "region",
            "Help": "Region to connect to.",
            "Provider": "AWS",
            "Default": "",
            "Value": null,
            "Examples": [
                {"Value": "us-east-1", "Help": "US East"},
                {"Value": "eu-west-1", "Help": "EU Ireland"}
            ],
            "Required": false,
            "IsPassword": false,
            "Advanced": false,
            "Exclusive": false,
            "Type": "string",
            "DefaultStr": "",
            "Hide": 0
        })
    }

    #[test]
    fn test_decodes_rclone_option() {
        let def = FieldDefinition::from_rclone(&s3_region()).unwrap();
        assert_eq!(def.name, "region");
        assert_eq!(def.field_type, FieldType::String);
        assert_eq!(def.examples.len(), 2);
        assert_eq!(def.examples[0].value, "us-east-1");
        assert_eq!(def.provider.as_deref(), Some("AWS"));
        assert!(def.value.is_none());
        assert!(!def.hidden);
    }

    #[test]
    fn test_type_mapping() {
        let ex = vec![FieldExample {
            value: "off".into(),
            help: String::new(),
            provider: None,
        }];
        assert_eq!(FieldType::from_rclone("Duration", false, false, &[]), FieldType::Duration);
        assert_eq!(FieldType::from_rclone("SizeSuffix", false, false, &[]), FieldType::SizeSuffix);
        assert_eq!(FieldType::from_rclone("int64", false, false, &[]), FieldType::Int);
        assert_eq!(FieldType::from_rclone("string", true, false, &[]), FieldType::Password);
        assert_eq!(
            FieldType::from_rclone("CacheMode", false, true, &ex),
            FieldType::Enum {
                choices: vec!["off".into()]
            }
        );
        assert_eq!(
            FieldType::from_rclone("Encoding", false, false, &[]),
            FieldType::Other {
                name: "Encoding".into()
            }
        );
    }

    #[test]
    fn test_provider_visibility_rules() {
        let mut def = FieldDefinition::from_rclone(&s3_region()).unwrap();
        assert!(def.visible_for(Some("AWS")));
        assert!(def.visible_for(Some("aws")));
        assert!(!def.visible_for(Some("Minio")));
        assert!(!def.visible_for(None));

        def.provider = Some("!AWS,Ceph".into());
        assert!(!def.visible_for(Some("Ceph")));
        assert!(def.visible_for(Some("Minio")));
        assert!(def.visible_for(None));

        def.provider = None;
        assert!(def.visible_for(Some("anything")));
    }

    #[test]
    fn test_initial_value_is_typed() {
        let raw = json!({"Name": "checksum", "Type": "bool", "Default": true, "DefaultStr": "true"});
        let def = FieldDefinition::from_rclone(&raw).unwrap();
        assert_eq!(def.initial_value(), json!(true));

        let raw = json!({"Name": "transfers", "Type": "int", "Default": 4, "DefaultStr": "4"});
        let def = FieldDefinition::from_rclone(&raw).unwrap();
        assert_eq!(def.initial_value(), json!(4));

        let raw = json!({"Name": "chunk_size", "Type": "SizeSuffix", "Default": 8388608, "DefaultStr": "8Mi"});
        let def = FieldDefinition::from_rclone(&raw).unwrap();
        assert_eq!(def.initial_value(), json!("8Mi"));
    }

    #[test]
    fn test_hidden_and_field_name_fallback() {
        let raw = json!({"FieldName": "Vfs.CacheMode", "Type": "string", "Hide": 2});
        let def = FieldDefinition::from_rclone(&raw).unwrap();
        assert_eq!(def.name, "Vfs.CacheMode");
        assert!(def.hidden);
    }

    #[test]
    fn test_nameless_option_is_rejected() {
        assert!(FieldDefinition::from_rclone(&json!({"Type": "string"})).is_err());
        let list = FieldDefinition::list_from_rclone(&json!([{"Type": "string"}, s3_region()]));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_backend_type_provider_choices() {
        let raw = json!({
            "Name": "s3",
            "Description": "Amazon S3 Compliant Storage Providers",
            "Prefix": "s3",
            "Options": [
                {"Name": "provider", "Type": "string", "Examples": [{"Value": "AWS"}, {"Value": "Minio"}]},
                s3_region()
            ]
        });
        let backend = BackendType::from_rclone(&raw).unwrap();
        assert_eq!(backend.name, "s3");
        assert_eq!(backend.options.len(), 2);
        assert_eq!(backend.provider_choices(), vec!["AWS", "Minio"]);
    }
}
