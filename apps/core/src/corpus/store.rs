//! Policy store: immutable corpus snapshots with atomic replacement.
//!
//! Readers clone an `Arc<PolicySnapshot>` and then work lock-free on a fully
//! built snapshot. A reload builds a complete new snapshot off to the side and
//! swaps the pointer in a single write. Reloads are serialized by a separate
//! mutex so two reloads never interleave.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use super::index::{DomainCoverage, DomainIndex};
use super::policy::{DomainDocument, Policy};
use crate::error::AppError;

/// One consistent view of the whole corpus.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    generation: u64,
    domains: BTreeMap<String, Arc<DomainIndex>>,
    /// Domains that failed to load, with the reason. Never served.
    quarantined: BTreeMap<String, String>,
}

impl PolicySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn domain(&self, name: &str) -> Option<&Arc<DomainIndex>> {
        self.domains.get(&name.trim().to_lowercase())
    }

    /// Looks a domain up for serving; quarantined and unknown domains are errors.
    pub fn require(&self, name: &str) -> Result<Arc<DomainIndex>, AppError> {
        let key = name.trim().to_lowercase();
        if let Some(reason) = self.quarantined.get(&key) {
            return Err(AppError::Config(format!(
                "domain '{}' is unavailable until its corpus is corrected: {}",
                key, reason
            )));
        }
        self.domains
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("unknown domain '{}'", key)))
    }

    pub fn domains(&self) -> impl Iterator<Item = &Arc<DomainIndex>> {
        self.domains.values()
    }

    pub fn domain_names(&self) -> Vec<String> {
        self.domains.keys().cloned().collect()
    }

    pub fn is_quarantined(&self, name: &str) -> bool {
        self.quarantined.contains_key(&name.trim().to_lowercase())
    }

    pub fn quarantined(&self) -> &BTreeMap<String, String> {
        &self.quarantined
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn total_policies(&self) -> usize {
        self.domains.values().map(|d| d.policies().len()).sum()
    }

    pub fn coverage(&self) -> Vec<DomainCoverage> {
        self.domains.values().map(|d| d.coverage()).collect()
    }
}

/// Builds the immutable index for one validated document.
pub fn build_domain(doc: DomainDocument) -> Result<DomainIndex, AppError> {
    doc.check()?;
    let key = doc.domain_key();
    let policies: Vec<Policy> = doc.policies.into_iter().map(Policy::from).collect();
    Ok(DomainIndex::build(&key, policies)
        .with_version(doc.version)
        .with_detection_keywords(doc.detection_keywords)
        .with_threshold(doc.default_threshold))
}

/// Shared, hot-reloadable policy corpus.
#[derive(Debug, Default)]
pub struct PolicyStore {
    current: RwLock<Arc<PolicySnapshot>>,
    reload_lock: Mutex<()>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from in-memory documents. Any invalid document is an error.
    pub fn from_documents(docs: Vec<DomainDocument>) -> Result<Self, AppError> {
        let mut domains = BTreeMap::new();
        for doc in docs {
            let index = build_domain(doc)?;
            let key = index.domain().to_string();
            if domains.insert(key.clone(), Arc::new(index)).is_some() {
                return Err(AppError::Config(format!("domain '{}' defined twice", key)));
            }
        }
        let snapshot = PolicySnapshot {
            generation: 1,
            domains,
            quarantined: BTreeMap::new(),
        };
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, snapshot: PolicySnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn lock_reload(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.reload_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replaces the whole corpus with the `*.json` documents in `dir`.
    ///
    /// A malformed document quarantines its domain (named by the document, or
    /// by the file stem if it could not be parsed); valid domains are served.
    /// Fails only if the directory itself cannot be read.
    #[instrument(skip(self), fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Arc<PolicySnapshot>, AppError> {
        let dir = dir.as_ref();
        let _reload = self.lock_reload();

        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(|e| {
                AppError::Config(format!(
                    "policy store '{}' cannot be read: {}",
                    dir.display(),
                    e
                ))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut domains = BTreeMap::new();
        let mut quarantined = BTreeMap::new();

        for path in paths {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            let loaded = fs::read_to_string(&path)
                .map_err(AppError::from)
                .and_then(|raw| DomainDocument::from_json(&raw))
                .and_then(|doc| {
                    let key = doc.domain_key();
                    build_domain(doc).map(|index| (key, index))
                });

            match loaded {
                Ok((key, index)) => {
                    if domains.contains_key(&key) {
                        let reason = format!("domain defined twice (again in {})", path.display());
                        error!(domain = %key, "{}", reason);
                        domains.remove(&key);
                        quarantined.insert(key, reason);
                        continue;
                    }
                    if quarantined.contains_key(&key) {
                        continue;
                    }
                    info!(
                        domain = %key,
                        policies = index.policies().len(),
                        vocabulary = index.space().vocabulary_size(),
                        "Loaded policy domain"
                    );
                    domains.insert(key, Arc::new(index));
                }
                Err(e) => {
                    error!(file = %path.display(), "Policy document rejected: {}", e);
                    let key = domain_name_hint(&path).unwrap_or(stem);
                    domains.remove(&key);
                    quarantined.insert(key, e.to_string());
                }
            }
        }

        if domains.is_empty() {
            warn!("Policy store contains no servable domains");
        }

        let snapshot = PolicySnapshot {
            generation: self.snapshot().generation + 1,
            domains,
            quarantined,
        };
        self.publish(snapshot);
        Ok(self.snapshot())
    }

    /// Builds a new index for one domain and swaps it in.
    ///
    /// On error the previous snapshot stays in place untouched. On success the
    /// domain is served from the new index and any quarantine is lifted.
    #[instrument(skip(self, doc), fields(domain = %doc.domain))]
    pub fn reload_domain(&self, doc: DomainDocument) -> Result<Arc<PolicySnapshot>, AppError> {
        let _reload = self.lock_reload();

        let index = build_domain(doc).map_err(|e| {
            warn!("Reload rejected, keeping previous index: {}", e);
            e
        })?;

        let previous = self.snapshot();
        let mut domains = previous.domains.clone();
        let mut quarantined = previous.quarantined.clone();
        let key = index.domain().to_string();
        quarantined.remove(&key);
        domains.insert(key.clone(), Arc::new(index));

        self.publish(PolicySnapshot {
            generation: previous.generation + 1,
            domains,
            quarantined,
        });
        info!(domain = %key, generation = previous.generation + 1, "Policy domain reloaded");
        Ok(self.snapshot())
    }

    /// Parses a JSON document and reloads its domain.
    pub fn reload_domain_json(&self, raw: &str) -> Result<Arc<PolicySnapshot>, AppError> {
        self.reload_domain(DomainDocument::from_json(raw)?)
    }
}

/// Best-effort domain name from a document that failed validation.
fn domain_name_hint(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value
        .get("domain")
        .and_then(|d| d.as_str())
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(domain: &str, policy_id: &str) -> DomainDocument {
        DomainDocument::from_json(&format!(
            r#"{{
                "domain": "{domain}",
                "policies": [{{
                    "id": "{policy_id}",
                    "text": "Never request card verification values",
                    "category": "security",
                    "severity_if_violated": "high",
                    "keywords": ["cvv"],
                    "violation_patterns": ["what is your cvv"]
                }}]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_from_documents() {
        let store = PolicyStore::from_documents(vec![doc("banking", "B1")]).unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.domain_names(), vec!["banking".to_string()]);
        assert_eq!(snap.total_policies(), 1);
        assert!(snap.require("Banking").is_ok());
        assert!(matches!(snap.require("retail"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let result = PolicyStore::from_documents(vec![doc("banking", "B1"), doc("banking", "B2")]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_reload_swaps_snapshot_and_keeps_old_readers_valid() {
        let store = PolicyStore::from_documents(vec![doc("banking", "B1")]).unwrap();
        let before = store.snapshot();

        store.reload_domain(doc("banking", "B2")).unwrap();
        let after = store.snapshot();

        assert_eq!(after.generation(), before.generation() + 1);
        assert!(after.domain("banking").unwrap().policy("B2").is_some());
        // A reader holding the old snapshot still sees a complete old index.
        assert!(before.domain("banking").unwrap().policy("B1").is_some());
        assert!(before.domain("banking").unwrap().policy("B2").is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_index() {
        let store = PolicyStore::from_documents(vec![doc("banking", "B1")]).unwrap();
        let mut bad = doc("banking", "B1");
        bad.policies.push(bad.policies[0].clone());

        assert!(store.reload_domain(bad).is_err());
        let snap = store.snapshot();
        assert_eq!(snap.generation(), 1);
        assert!(snap.domain("banking").unwrap().policy("B1").is_some());
    }
}
