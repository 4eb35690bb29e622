//! Record acceptance checks
//!
//! The required-field set and URL-checked fields are injected policy
//! (`ValidationConfig`), not hardcoded. Every failing rule is reported.

use serde::{Deserialize, Serialize};

use crate::domain::Record;
use crate::infrastructure::config::{FieldRule, ValidationConfig};

/// Outcome of validating one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Ledger message for a rejected record
    pub fn rejection_message(&self) -> String {
        format!("Sanity check failed: {}", self.errors.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    required: Vec<FieldRule>,
    url_fields: Vec<FieldRule>,
}

impl RecordValidator {
    pub fn new(policy: &ValidationConfig) -> Self {
        Self {
            required: policy.required.clone(),
            url_fields: policy.url_fields.clone(),
        }
    }

    pub fn validate(&self, record: &Record) -> ValidationReport {
        let mut errors: Vec<String> = self
            .required
            .iter()
            .filter(|rule| record.is_blank(&rule.field))
            .map(|rule| rule.message.clone())
            .collect();

        // Syntax is only checked for fields that are present
        errors.extend(
            self.url_fields
                .iter()
                .filter(|rule| {
                    record
                        .text(&rule.field)
                        .is_some_and(|value| url::Url::parse(value.trim()).is_err())
                })
                .map(|rule| rule.message.clone()),
        );

        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalUrl;

    fn record(fields: &[(&str, &str)]) -> Record {
        let mut record = Record::for_url(&CanonicalUrl::new("https://www.saashub.com/x"));
        for (name, value) in fields {
            record.set_text(name, Some((*value).to_string()));
        }
        record
    }

    #[test]
    fn malformed_website_is_the_only_error() {
        let report = RecordValidator::default().validate(&record(&[
            ("Website", "not-a-url"),
            ("CompanyDescription", "x"),
            ("AlternativesPageURL", "y"),
            ("StatusPageURL", "z"),
        ]));
        assert_eq!(
            report,
            ValidationReport {
                is_valid: false,
                errors: vec!["Website URL is not valid".to_string()],
            }
        );
    }

    #[test]
    fn missing_website_is_not_also_malformed() {
        let report = RecordValidator::default().validate(&record(&[
            ("CompanyDescription", "x"),
            ("AlternativesPageURL", "y"),
            ("StatusPageURL", "not a url"),
        ]));
        assert_eq!(report.errors, vec!["Website URL is missing".to_string()]);
    }

    #[test]
    fn all_failures_are_collected_in_rule_order() {
        let report = RecordValidator::default().validate(&record(&[("CompanyDescription", "  ")]));
        assert!(!report.is_valid);
        assert_eq!(
            report.errors,
            vec![
                "Website URL is missing",
                "Company description is missing",
                "Alternatives page URL is missing",
                "Status page URL is missing",
            ]
        );
        assert_eq!(
            report.rejection_message(),
            "Sanity check failed: Website URL is missing, Company description is missing, \
             Alternatives page URL is missing, Status page URL is missing"
        );
    }

    #[test]
    fn complete_record_is_accepted() {
        let report = RecordValidator::default().validate(&record(&[
            ("Website", "https://notion.so"),
            ("CompanyDescription", "Workspace"),
            ("AlternativesPageURL", "https://www.saashub.com/notion-alternatives"),
            ("StatusPageURL", "https://www.saashub.com/notion-status"),
        ]));
        assert!(report.is_valid);
        assert_eq!(serde_json::to_value(&report).unwrap(), serde_json::json!({"isValid": true}));
    }

    #[test]
    fn policy_is_injected() {
        let policy = ValidationConfig {
            required: vec![FieldRule::new("CompanyName", "Name is missing")],
            url_fields: vec![],
        };
        let report = RecordValidator::new(&policy).validate(&record(&[]));
        assert_eq!(report.errors, vec!["Name is missing".to_string()]);
    }
}
