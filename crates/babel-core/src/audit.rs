//! Audit trail for rejected merges and dropped evidence.
//!
//! A run that rejects merges still completes, so every rejection is counted
//! here together with a bounded number of examples an operator can inspect.
//! Counts are exact; only the example lists are capped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_EXAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A group would have put two identifiers with a unique prefix in one clique.
    UniquePrefixConflict,
    /// A subject had more than one distinct object under a single-use predicate.
    SingleUseDropped,
    /// A source descriptor resolved to more than one concept.
    AmbiguousSourceDescriptor,
    /// An atom or source descriptor had no concept.
    UnresolvedReference,
    /// An identifier appeared in more than one supplied compendium.
    CrossCompendiumCollision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditExample {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub count: u64,
    pub examples: Vec<AuditExample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    max_examples: usize,
    entries: BTreeMap<AuditKind, AuditEntry>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXAMPLES)
    }
}

impl AuditLog {
    pub fn new(max_examples: usize) -> Self {
        Self {
            max_examples,
            entries: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, kind: AuditKind, detail: impl Into<String>, identifiers: Vec<String>) {
        let entry = self.entries.entry(kind).or_default();
        entry.count += 1;
        if entry.examples.len() < self.max_examples {
            entry.examples.push(AuditExample {
                detail: detail.into(),
                identifiers,
            });
        }
    }

    pub fn count(&self, kind: AuditKind) -> u64 {
        self.entries.get(&kind).map(|e| e.count).unwrap_or(0)
    }

    pub fn examples(&self, kind: AuditKind) -> &[AuditExample] {
        self.entries
            .get(&kind)
            .map(|e| e.examples.as_slice())
            .unwrap_or(&[])
    }

    pub fn total(&self) -> u64 {
        self.entries.values().map(|e| e.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (AuditKind, &AuditEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Fold another log into this one (e.g. one log per pipeline stage).
    pub fn absorb(&mut self, other: AuditLog) {
        for (kind, entry) in other.entries {
            let mine = self.entries.entry(kind).or_default();
            mine.count += entry.count;
            let room = self.max_examples.saturating_sub(mine.examples.len());
            mine.examples.extend(entry.examples.into_iter().take(room));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_exact_and_examples_bounded() {
        let mut log = AuditLog::new(2);
        for i in 0..5 {
            log.record(
                AuditKind::UniquePrefixConflict,
                format!("conflict {i}"),
                vec![format!("GO:{i}")],
            );
        }
        assert_eq!(log.count(AuditKind::UniquePrefixConflict), 5);
        assert_eq!(log.examples(AuditKind::UniquePrefixConflict).len(), 2);
        assert_eq!(log.count(AuditKind::SingleUseDropped), 0);
        assert_eq!(log.total(), 5);
    }

    #[test]
    fn absorb_adds_counts() {
        let mut a = AuditLog::new(3);
        a.record(AuditKind::SingleUseDropped, "x", vec![]);
        let mut b = AuditLog::new(3);
        b.record(AuditKind::SingleUseDropped, "y", vec![]);
        b.record(AuditKind::UnresolvedReference, "z", vec![]);
        a.absorb(b);
        assert_eq!(a.count(AuditKind::SingleUseDropped), 2);
        assert_eq!(a.examples(AuditKind::SingleUseDropped).len(), 2);
        assert_eq!(a.count(AuditKind::UnresolvedReference), 1);
    }

    #[test]
    fn serializes_with_snake_case_kinds() {
        let mut log = AuditLog::new(1);
        log.record(AuditKind::CrossCompendiumCollision, "dup", vec!["RXCUI:1".into()]);
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"cross_compendium_collision\""));
        let back: AuditLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
