//! CURIE helpers and prefix-priority ordering.
//!
//! Identifiers travel through the engine as plain strings of the form
//! `prefix:local-id`. The prefix is everything before the first `:`, so
//! `PUBCHEM.COMPOUND:2244` has prefix `PUBCHEM.COMPOUND` and
//! `UMLS:C0004057` has prefix `UMLS`.

use crate::error::{BabelError, Result};
use ahash::AHashMap;
use std::cmp::Ordering;

/// Prefix of a CURIE, or `None` when the string has no `:`.
pub fn prefix(curie: &str) -> Option<&str> {
    curie.split_once(':').map(|(p, _)| p)
}

/// Split a CURIE into `(prefix, local_id)`, rejecting strings without a prefix.
pub fn split(curie: &str) -> Result<(&str, &str)> {
    match curie.split_once(':') {
        Some((p, local)) if !p.is_empty() => Ok((p, local)),
        _ => Err(BabelError::InvalidCurie(curie.to_string())),
    }
}

/// Validate and return an owned CURIE.
pub fn parse(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    split(trimmed)?;
    Ok(trimmed.to_string())
}

/// Fixed prefix ranking used to order clique members.
///
/// Listed prefixes rank in list order; unlisted prefixes rank after every
/// listed one. Ties (same rank) fall back to the identifier string, so the
/// ordering is total and independent of input order.
#[derive(Debug, Clone, Default)]
pub struct PrefixRanking {
    ranks: AHashMap<String, usize>,
    unlisted: usize,
}

impl PrefixRanking {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranks = AHashMap::new();
        for p in prefixes {
            let next = ranks.len();
            ranks.entry(p.as_ref().to_string()).or_insert(next);
        }
        let unlisted = ranks.len();
        Self { ranks, unlisted }
    }

    pub fn rank(&self, curie: &str) -> usize {
        prefix(curie)
            .and_then(|p| self.ranks.get(p).copied())
            .unwrap_or(self.unlisted)
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.rank(a).cmp(&self.rank(b)).then_with(|| a.cmp(b))
    }

    /// Sort identifiers best-first.
    pub fn sort<S: AsRef<str>>(&self, ids: &mut [S]) {
        ids.sort_by(|a, b| self.compare(a.as_ref(), b.as_ref()));
    }

    /// Best-ranked identifier of a non-empty slice.
    pub fn leader<'a, S: AsRef<str>>(&self, ids: &'a [S]) -> Option<&'a S> {
        ids.iter()
            .min_by(|a, b| self.compare(a.as_ref(), b.as_ref()))
    }
}
