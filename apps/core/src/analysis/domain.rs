//! Domain selection by keyword counting.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::corpus::{DomainIndex, PolicySnapshot};
use crate::error::AppError;
use crate::models::Conversation;
use crate::text::{count_word_prefix, normalize};

pub const AUTO_DOMAIN: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// The caller named the domain.
    Explicit,
    /// Chosen by keyword hits.
    Detected,
    /// Default domain, because detection was inconclusive or the requested domain is unknown.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSelection {
    pub domain: String,
    pub method: SelectionMethod,
    pub requested: String,
    /// Keyword hits per domain (auto detection only).
    pub hits: BTreeMap<String, usize>,
    pub confidence: f32,
}

/// Detection keyword occurrences of one domain within normalized text.
pub fn keyword_hits(index: &DomainIndex, normalized: &str) -> usize {
    index
        .detection_keywords()
        .iter()
        .map(|k| count_word_prefix(normalized, k))
        .sum()
}

/// Resolves `requested` (a domain name or "auto") to a served domain.
pub fn select_domain(
    snapshot: &PolicySnapshot,
    requested: &str,
    conversation: &Conversation,
    config: &PipelineConfig,
) -> Result<(DomainSelection, Arc<DomainIndex>), AppError> {
    let requested = requested.trim().to_lowercase();

    if !requested.is_empty() && requested != AUTO_DOMAIN {
        if snapshot.is_quarantined(&requested) {
            // Surfaces the configuration error with its reason.
            snapshot.require(&requested)?;
        }
        if let Some(index) = snapshot.domain(&requested) {
            let selection = DomainSelection {
                domain: requested.clone(),
                method: SelectionMethod::Explicit,
                requested,
                hits: BTreeMap::new(),
                confidence: 1.0,
            };
            return Ok((selection, Arc::clone(index)));
        }
        if !config.fallback_to_default_domain {
            return Err(AppError::Validation(format!(
                "unknown domain '{}' and fallback is disabled",
                requested
            )));
        }
        warn!(requested = %requested, fallback = %config.default_domain, "Unknown domain, using default");
        return fallback(snapshot, requested, BTreeMap::new(), config);
    }

    let normalized = normalize(&conversation.full_text());
    let hits: BTreeMap<String, usize> = snapshot
        .domains()
        .map(|index| (index.domain().to_string(), keyword_hits(index, &normalized)))
        .collect();
    let total: usize = hits.values().sum();

    let mut best: Option<(&String, usize)> = None;
    for (domain, &count) in &hits {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((domain, count));
        }
    }
    debug!(?hits, "Domain keyword hits");

    match best {
        Some((domain, count)) if count >= config.min_domain_hits => {
            let domain = domain.clone();
            let index = snapshot.require(&domain)?;
            let confidence = (count as f32 / (total as f32 / 2.0).max(1.0)).min(0.99);
            let selection = DomainSelection {
                domain,
                method: SelectionMethod::Detected,
                requested: AUTO_DOMAIN.to_string(),
                hits,
                confidence,
            };
            Ok((selection, index))
        }
        _ => fallback(snapshot, AUTO_DOMAIN.to_string(), hits, config),
    }
}

fn fallback(
    snapshot: &PolicySnapshot,
    requested: String,
    hits: BTreeMap<String, usize>,
    config: &PipelineConfig,
) -> Result<(DomainSelection, Arc<DomainIndex>), AppError> {
    let index = snapshot.require(&config.default_domain).map_err(|e| match e {
        AppError::Validation(_) => AppError::Validation(format!(
            "no corpus for '{}' and the default domain '{}' is not loaded",
            requested, config.default_domain
        )),
        other => other,
    })?;
    let selection = DomainSelection {
        domain: index.domain().to_string(),
        method: SelectionMethod::Fallback,
        requested,
        hits,
        confidence: 0.3,
    };
    Ok((selection, index))
}
