//! Extracted listing records and the declared column schema
//!
//! A `Record` is a flat, insertion-ordered map of field name to JSON value (string,
//! integer or null). The `url` field is the durable join key back to the canonical URL.
//! `RecordSchema` is declared once by the extractor and drives every tabular export,
//! so tables never depend on which optional fields the first record happened to carry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::canonical_url::CanonicalUrl;

/// Field holding the canonical URL inside every record
pub const URL_FIELD: &str = "url";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn for_url(url: &CanonicalUrl) -> Self {
        let mut record = Self::new();
        record.set_url(url);
        record
    }

    pub fn set_url(&mut self, url: &CanonicalUrl) {
        self.0
            .insert(URL_FIELD.to_string(), Value::String(url.as_str().to_string()));
    }

    pub fn url(&self) -> Option<&str> {
        self.0.get(URL_FIELD).and_then(Value::as_str)
    }

    /// Set a text field; `None` is stored as an explicit null.
    pub fn set_text(&mut self, name: &str, value: Option<String>) {
        let value = value.map_or(Value::Null, Value::String);
        self.0.insert(name.to_string(), value);
    }

    pub fn set_integer(&mut self, name: &str, value: i64) {
        self.0.insert(name.to_string(), Value::from(value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Non-blank string value of a field
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Absent, null, or a blank string
    pub fn is_blank(&self, name: &str) -> bool {
        match self.0.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Url,
    /// Raw markup fragment kept verbatim
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered list of declared output columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; a repeated name keeps its first position.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        if !self.contains(&name) {
            self.fields.push(FieldSpec { name, kind });
        }
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Record fields the schema does not declare
    pub fn undeclared<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        record.field_names().filter(|name| !self.contains(name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_insertion_order() {
        let mut record = Record::for_url(&CanonicalUrl::new("https://x.test/a"));
        record.set_text("Website", Some("https://a.test".into()));
        record.set_integer("Number of reviews", 3);
        record.set_text("pricingURL", None);

        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["url", "Website", "Number of reviews", "pricingURL"]);
        assert_eq!(record.url(), Some("https://x.test/a"));
        assert!(record.is_blank("pricingURL"));
        assert!(record.is_blank("missing"));
        assert!(!record.is_blank("Number of reviews"));
    }

    #[test]
    fn blank_strings_count_as_blank() {
        let mut record = Record::new();
        record.set_text("CompanyDescription", Some("   ".into()));
        assert!(record.is_blank("CompanyDescription"));
        assert_eq!(record.text("CompanyDescription"), None);
    }

    #[test]
    fn schema_ignores_duplicate_columns() {
        let schema = RecordSchema::new()
            .field("url", FieldKind::Url)
            .field("Website", FieldKind::Url)
            .field("url", FieldKind::Text);
        assert_eq!(schema.columns().collect::<Vec<_>>(), vec!["url", "Website"]);
        assert_eq!(schema.kind_of("url"), Some(FieldKind::Url));
    }

    #[test]
    fn undeclared_fields_are_reported() {
        let schema = RecordSchema::new().field("url", FieldKind::Url);
        let mut record = Record::for_url(&CanonicalUrl::new("https://x.test/a"));
        record.set_text("extra", Some("x".into()));
        assert_eq!(schema.undeclared(&record), vec!["extra"]);
    }
}
