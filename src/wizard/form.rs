use crate::schema::FieldDefinition;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Editable state of one schema field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub value: Value,
    pub default: Value,
    /// Set once the user edits the field, and kept even if the value is
    /// later put back to the default
    pub touched: bool,
}

impl FieldEntry {
    fn fresh(default: Value) -> Self {
        Self {
            value: default.clone(),
            default,
            touched: false,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.touched || self.value != self.default
    }
}

/// Values of a dynamic schema with per-field change tracking.
///
/// Only changed fields go into the outgoing payload. Stored values for keys
/// the current schema does not declare are carried through untouched.
#[derive(Debug, Clone, Default)]
pub struct OptionsForm {
    fields: BTreeMap<String, FieldEntry>,
    extra: Map<String, Value>,
}

impl OptionsForm {
    pub fn from_schema(defs: &[FieldDefinition]) -> Self {
        Self {
            fields: defs
                .iter()
                .map(|def| (def.name.clone(), FieldEntry::fresh(def.initial_value())))
                .collect(),
            extra: Map::new(),
        }
    }

    /// Reset to schema defaults, then apply stored values. Stored values were
    /// chosen explicitly at some point, so they count as touched.
    pub fn load(&mut self, stored: &Map<String, Value>) {
        self.extra.clear();
        for entry in self.fields.values_mut() {
            *entry = FieldEntry::fresh(entry.default.clone());
        }
        for (name, value) in stored {
            match self.fields.get_mut(name) {
                Some(entry) => {
                    entry.value = value.clone();
                    entry.touched = true;
                }
                None => {
                    self.extra.insert(name.clone(), value.clone());
                }
            }
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            Some(entry) => {
                entry.value = value;
                entry.touched = true;
            }
            None => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }

    /// Put a field back to its default; the reset itself is sent
    pub fn reset(&mut self, name: &str) {
        if let Some(entry) = self.fields.get_mut(name) {
            entry.value = entry.default.clone();
            entry.touched = true;
        } else {
            self.extra.remove(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(name)
            .map(|entry| &entry.value)
            .or_else(|| self.extra.get(name))
    }

    pub fn entry(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.get(name)
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(FieldEntry::is_changed)
            .unwrap_or_else(|| self.extra.contains_key(name))
    }

    /// Every current value, for validation
    pub fn values(&self) -> Map<String, Value> {
        let mut values = self.extra.clone();
        for (name, entry) in &self.fields {
            values.insert(name.clone(), entry.value.clone());
        }
        values
    }

    /// Changed fields plus carried-through unknown keys
    pub fn changed_payload(&self) -> Map<String, Value> {
        let mut payload = self.extra.clone();
        for (name, entry) in self.fields.iter().filter(|(_, e)| e.is_changed()) {
            payload.insert(name.clone(), entry.value.clone());
        }
        payload
    }

    /// Swap in a new schema, keeping whatever the user already changed
    pub fn rebase(&mut self, defs: &[FieldDefinition]) {
        let changed = self.changed_payload();
        *self = Self::from_schema(defs);
        self.load(&changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::from_rclone(&json!({"Name": "transfers", "Type": "int", "Default": 4})).unwrap(),
            FieldDefinition::from_rclone(&json!({"Name": "checksum", "Type": "bool", "Default": false})).unwrap(),
            FieldDefinition::from_rclone(&json!({"Name": "bwlimit", "Type": "BwTimetable", "DefaultStr": ""})).unwrap(),
        ]
    }

    #[test]
    fn test_untouched_defaults_are_omitted() {
        let form = OptionsForm::from_schema(&schema());
        assert!(form.changed_payload().is_empty());
        assert_eq!(form.values().len(), 3);
        assert_eq!(form.get("transfers"), Some(&json!(4)));
    }

    #[test]
    fn test_reset_to_default_is_still_sent() {
        let mut form = OptionsForm::from_schema(&schema());
        form.set("transfers", json!(16));
        form.set("transfers", json!(4));
        let payload = form.changed_payload();
        assert_eq!(payload.get("transfers"), Some(&json!(4)));
        assert!(payload.get("checksum").is_none());

        form.reset("checksum");
        assert_eq!(form.changed_payload().get("checksum"), Some(&json!(false)));
    }

    #[test]
    fn test_load_keeps_unknown_keys() {
        let mut form = OptionsForm::from_schema(&schema());
        let mut stored = Map::new();
        stored.insert("checksum".into(), json!(true));
        stored.insert("legacy_flag".into(), json!("x"));
        form.load(&stored);

        assert!(form.is_changed("checksum"));
        assert!(!form.is_changed("transfers"));
        let payload = form.changed_payload();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get("legacy_flag"), Some(&json!("x")));

        form.load(&Map::new());
        assert!(form.changed_payload().is_empty());
    }

    #[test]
    fn test_rebase_preserves_changes() {
        let mut form = OptionsForm::default();
        form.set("transfers", json!(8));
        form.rebase(&schema());
        assert!(form.entry("transfers").unwrap().touched);
        assert_eq!(form.get("transfers"), Some(&json!(8)));
        assert!(!form.is_changed("checksum"));
    }
}
