//! Policy definitions and the on-disk document format.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use validator::Validate;

use crate::error::AppError;

const DEFAULT_REMEDIATION: &str = "Review policy compliance procedure.";
const DEFAULT_REGULATORY_BASIS: &str = "N/A";

/// Violation severity. Totally ordered: critical > high > medium > low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A loaded policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    pub id: String,
    pub text: String,
    pub category: String,
    pub severity: Severity,
    pub regulatory_basis: String,
    pub keywords: BTreeSet<String>,
    pub violation_patterns: BTreeSet<String>,
    pub remediation: String,
}

impl Policy {
    /// Text the policy's term vector is built from: clause text plus keywords.
    pub fn vector_text(&self) -> String {
        let mut text = self.text.clone();
        for keyword in &self.keywords {
            text.push(' ');
            text.push_str(keyword);
        }
        text
    }
}

/// A policy as written in a corpus document.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PolicyDocument {
    #[validate(length(min = 1, message = "policy id must not be empty"))]
    pub id: String,
    #[validate(length(min = 1, message = "policy text must not be empty"))]
    pub text: String,
    #[validate(length(min = 1))]
    pub category: String,
    pub severity_if_violated: Severity,
    #[serde(default)]
    pub regulatory_basis: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub violation_patterns: Vec<String>,
    #[serde(default)]
    pub remediation: Option<String>,
}

impl From<PolicyDocument> for Policy {
    fn from(doc: PolicyDocument) -> Self {
        let clean = |items: Vec<String>| -> BTreeSet<String> {
            items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Policy {
            id: doc.id.trim().to_string(),
            text: doc.text,
            category: doc.category,
            severity: doc.severity_if_violated,
            regulatory_basis: doc
                .regulatory_basis
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REGULATORY_BASIS.to_string()),
            keywords: clean(doc.keywords),
            violation_patterns: clean(doc.violation_patterns),
            remediation: doc
                .remediation
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REMEDIATION.to_string()),
        }
    }
}

/// One domain's corpus file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DomainDocument {
    #[validate(length(min = 1, message = "domain name must not be empty"))]
    pub domain: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Extra words counted during automatic domain selection.
    #[serde(default)]
    pub detection_keywords: Vec<String>,
    /// Similarity threshold for this domain; overrides the engine default.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_threshold: Option<f32>,
    #[validate(length(min = 1, message = "a domain needs at least one policy"))]
    #[validate(nested)]
    pub policies: Vec<PolicyDocument>,
}

impl DomainDocument {
    /// Parses and validates a JSON corpus document.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let doc: DomainDocument = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("malformed policy document: {}", e)))?;
        doc.check()?;
        Ok(doc)
    }

    /// Field validation plus per-domain id uniqueness.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate().map_err(|e| {
            AppError::Config(format!("invalid policy document '{}': {}", self.domain, e))
        })?;

        let mut seen = HashSet::new();
        for policy in &self.policies {
            if !seen.insert(policy.id.trim()) {
                return Err(AppError::Config(format!(
                    "duplicate policy id '{}' in domain '{}'",
                    policy.id, self.domain
                )));
            }
        }
        Ok(())
    }

    pub fn domain_key(&self) -> String {
        self.domain.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "domain": "Banking",
        "policies": [
            {
                "id": "BANK_SEC_3.2.1",
                "text": "Agents must never request a one-time password.",
                "category": "security",
                "severity_if_violated": "critical",
                "keywords": ["OTP", " otp ", ""],
                "violation_patterns": ["give me your otp"]
            }
        ]
    }"#;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_parse_document_defaults() {
        let doc = DomainDocument::from_json(DOC).unwrap();
        assert_eq!(doc.domain_key(), "banking");
        let policy = Policy::from(doc.policies[0].clone());
        assert_eq!(policy.regulatory_basis, "N/A");
        assert_eq!(policy.remediation, DEFAULT_REMEDIATION);
        // Trimmed and deduplicated, empty entries dropped.
        assert_eq!(policy.keywords.len(), 2);
        assert!(policy.vector_text().starts_with("Agents must never"));
    }

    #[test]
    fn test_unknown_severity_is_config_error() {
        let raw = DOC.replace("\"critical\"", "\"catastrophic\"");
        let err = DomainDocument::from_json(&raw).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut doc = DomainDocument::from_json(DOC).unwrap();
        doc.policies.push(doc.policies[0].clone());
        assert!(matches!(doc.check(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_empty_policy_list_rejected() {
        let raw = r#"{"domain": "telecom", "policies": []}"#;
        assert!(DomainDocument::from_json(raw).is_err());
    }
}
