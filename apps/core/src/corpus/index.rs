//! TF-IDF vector space over one domain's policies.
//!
//! Term weight = term frequency in the document x smoothed inverse document
//! frequency across the domain's policies: `idf = ln((N+1)/(df+1)) + 1`.
//! Similarity is cosine similarity, 0 when either vector has zero magnitude.
//!
//! Vectors are sparse and sorted by term id, so every dot product sums in the
//! same order and results are bit-for-bit reproducible.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::policy::{Policy, Severity};
use crate::text::index_terms;

/// Sparse vector: `(term_id, weight)` sorted by `term_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f32)>,
    norm: f32,
}

impl SparseVector {
    fn from_entries(entries: Vec<(usize, f32)>) -> Self {
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        Self { entries, norm }
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, wi) = self.entries[i];
            let (tj, wj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wi * wj;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine similarity clamped to [0, 1]; 0 for zero-magnitude vectors.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        if self.is_zero() || other.is_zero() {
            return 0.0;
        }
        (self.dot(other) / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

/// Vocabulary and IDF weights for one domain.
#[derive(Debug, Clone, Default)]
pub struct VectorSpace {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f32>,
    document_count: usize,
}

impl VectorSpace {
    /// Builds the space from tokenized documents.
    pub fn fit(documents: &[Vec<String>]) -> Self {
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f32;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (id, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), id);
            idf.push(((n + 1.0) / (df as f32 + 1.0)).ln() + 1.0);
        }

        Self {
            vocabulary,
            idf,
            document_count: documents.len(),
        }
    }

    /// TF-IDF vector for already-tokenized text. Out-of-vocabulary terms are ignored.
    pub fn vectorize_terms(&self, terms: &[String]) -> SparseVector {
        if terms.is_empty() {
            return SparseVector::default();
        }
        let total = terms.len() as f32;
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for term in terms {
            if let Some(&id) = self.vocabulary.get(term) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let entries = counts
            .into_iter()
            .map(|(id, count)| (id, (count as f32 / total) * self.idf[id]))
            .collect();
        SparseVector::from_entries(entries)
    }

    pub fn vectorize(&self, text: &str) -> SparseVector {
        self.vectorize_terms(&index_terms(text))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn idf_of(&self, term: &str) -> Option<f32> {
        self.vocabulary.get(term).map(|&id| self.idf[id])
    }
}

/// Immutable per-domain index: policies plus their vectors.
#[derive(Debug, Clone)]
pub struct DomainIndex {
    domain: String,
    version: Option<String>,
    policies: Vec<Policy>,
    vectors: Vec<SparseVector>,
    space: VectorSpace,
    detection_keywords: BTreeSet<String>,
    threshold_override: Option<f32>,
}

/// Coverage overview for one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainCoverage {
    pub domain: String,
    pub version: Option<String>,
    pub policy_count: usize,
    pub categories: Vec<String>,
    pub critical_policies: usize,
    pub vocabulary_size: usize,
}

impl DomainIndex {
    /// Builds the vector space for `policies`. Policy order is preserved.
    pub fn build(domain: &str, policies: Vec<Policy>) -> Self {
        let documents: Vec<Vec<String>> = policies
            .iter()
            .map(|p| index_terms(&p.vector_text()))
            .collect();
        let space = VectorSpace::fit(&documents);
        let vectors = documents
            .iter()
            .map(|terms| space.vectorize_terms(terms))
            .collect();

        let detection_keywords = policies
            .iter()
            .flat_map(|p| p.keywords.iter())
            .map(|k| crate::text::normalize(k))
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            domain: domain.to_string(),
            version: None,
            policies,
            vectors,
            space,
            detection_keywords,
            threshold_override: None,
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Adds words counted during automatic domain selection.
    pub fn with_detection_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = crate::text::normalize(keyword.as_ref());
            if !keyword.is_empty() {
                self.detection_keywords.insert(keyword);
            }
        }
        self
    }

    pub fn with_threshold(mut self, threshold: Option<f32>) -> Self {
        self.threshold_override = threshold;
        self
    }

    /// Cosine similarity of `text` against every policy, keyed by policy id.
    pub fn query(&self, text: &str) -> BTreeMap<String, f32> {
        let query = self.space.vectorize(text);
        self.policies
            .iter()
            .zip(&self.vectors)
            .map(|(policy, vector)| (policy.id.clone(), query.cosine(vector)))
            .collect()
    }

    /// Similarity of each policy (in policy order) against a prepared vector.
    pub fn similarities(&self, query: &SparseVector) -> Vec<f32> {
        self.vectors.iter().map(|v| query.cosine(v)).collect()
    }

    pub fn vectorize(&self, text: &str) -> SparseVector {
        self.space.vectorize(text)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn policy(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    pub fn space(&self) -> &VectorSpace {
        &self.space
    }

    pub fn detection_keywords(&self) -> &BTreeSet<String> {
        &self.detection_keywords
    }

    pub fn threshold_override(&self) -> Option<f32> {
        self.threshold_override
    }

    pub fn coverage(&self) -> DomainCoverage {
        let categories: BTreeSet<String> =
            self.policies.iter().map(|p| p.category.clone()).collect();
        DomainCoverage {
            domain: self.domain.clone(),
            version: self.version.clone(),
            policy_count: self.policies.len(),
            categories: categories.into_iter().collect(),
            critical_policies: self
                .policies
                .iter()
                .filter(|p| p.severity == Severity::Critical)
                .count(),
            vocabulary_size: self.space.vocabulary_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(id: &str, text: &str, keywords: &[&str]) -> Policy {
        Policy {
            id: id.to_string(),
            text: text.to_string(),
            category: "security".to_string(),
            severity: Severity::High,
            regulatory_basis: "N/A".to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            violation_patterns: BTreeSet::new(),
            remediation: "Review.".to_string(),
        }
    }

    fn index() -> DomainIndex {
        DomainIndex::build(
            "banking",
            vec![
                policy("P1", "Never request the OTP from a customer", &["otp"]),
                policy("P2", "Always state the loan interest rate", &["loan"]),
            ],
        )
    }

    #[test]
    fn test_smoothed_idf() {
        let idx = index();
        // "otp" appears in 1 of 2 documents.
        let expected = (3.0f32 / 2.0).ln() + 1.0;
        assert!((idx.space().idf_of("otp").unwrap() - expected).abs() < 1e-6);
        assert_eq!(idx.space().document_count(), 2);
    }

    #[test]
    fn test_query_ranks_relevant_policy() {
        let idx = index();
        let scores = idx.query("the agent asked for my otp");
        assert!(scores["P1"] > scores["P2"]);
        assert_eq!(scores["P2"], 0.0);
    }

    #[test]
    fn test_zero_overlap_and_empty_text() {
        let idx = index();
        assert!(idx.query("").values().all(|&s| s == 0.0));
        assert!(idx.query("weather is lovely").values().all(|&s| s == 0.0));
    }

    #[test]
    fn test_identical_text_is_maximal() {
        let idx = index();
        let scores = idx.query("Never request the OTP from a customer otp");
        assert!((scores["P1"] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_coverage() {
        let coverage = index().coverage();
        assert_eq!(coverage.policy_count, 2);
        assert_eq!(coverage.categories, vec!["security".to_string()]);
        assert_eq!(coverage.critical_policies, 0);
    }
}
