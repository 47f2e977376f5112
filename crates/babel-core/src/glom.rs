//! Glom: union-find over identifiers.
//!
//! Equivalence evidence arrives as groups (a concordance pair is a group of
//! two; some sources hand over larger co-reference groups). Each group is
//! merged with every clique it touches, unless the merged clique would hold
//! two distinct identifiers sharing a *unique* prefix. In that case the whole
//! group is rejected and no existing clique changes.
//!
//! ```text
//!   merge({A1:x, B:1})   ->  {A1:x, B:1}
//!   merge({A1:y, B:1})   ->  rejected: A1 would appear twice
//!                            {A1:x, B:1}  {A1:y}
//! ```
//!
//! Identifiers are interned to dense ids and the partition lives in plain
//! vectors (parent / size / members), so "which clique is X in" is always a
//! root lookup and two members of one clique can never disagree about it.
//! Unions are by size with path halving on the mutable find.

use crate::audit::{AuditKind, AuditLog};
use crate::curie;
use crate::interner::{IdentId, IdentifierInterner};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Handle to a clique (the id of its current root).
///
/// Only valid until the next successful merge: a later union may absorb the
/// clique into another root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CliqueId(u32);

impl CliqueId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A merge that would break the unique-prefix invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unique prefix conflict on [{}]: {}", .prefixes.join(", "), .identifiers.join(", "))]
pub struct UniquePrefixConflict {
    /// Unique prefixes that would have appeared more than once.
    pub prefixes: Vec<String>,
    /// Distinct identifiers carrying those prefixes across the touched cliques.
    pub identifiers: Vec<String>,
    /// The incoming group, as given.
    pub group: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Two or more cliques were joined.
    Merged { clique: CliqueId, size: usize },
    /// Every member already shared one clique (including one-member groups).
    AlreadyMerged { clique: CliqueId },
    /// The group was rejected; existing cliques are untouched.
    Rejected(UniquePrefixConflict),
    /// The group had no members.
    Empty,
}

impl MergeOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, MergeOutcome::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlomStats {
    pub groups: u64,
    pub merged: u64,
    pub already_merged: u64,
    pub rejected: u64,
}

type UniqueSlot = u16;

pub struct GlomEngine {
    interner: IdentifierInterner,
    /// Union-find parent pointers, indexed by `IdentId`.
    parent: Vec<u32>,
    /// Clique size; meaningful for roots only.
    size: Vec<u32>,
    /// Clique members; non-empty for roots only.
    members: Vec<Vec<IdentId>>,
    /// Unique-prefixed members of each root clique, at most one per slot.
    uniques: Vec<Vec<(UniqueSlot, IdentId)>>,
    /// Unique slot of each identifier, if its prefix is unique-constrained.
    slot_of: Vec<Option<UniqueSlot>>,
    unique_prefixes: AHashMap<String, UniqueSlot>,
    roots: usize,
    stats: GlomStats,
    audit: AuditLog,
}

impl Default for GlomEngine {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl GlomEngine {
    pub fn new<I, S>(unique_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots = AHashMap::new();
        for p in unique_prefixes {
            let next = slots.len() as UniqueSlot;
            slots.entry(p.as_ref().to_string()).or_insert(next);
        }
        Self {
            interner: IdentifierInterner::new(),
            parent: Vec::new(),
            size: Vec::new(),
            members: Vec::new(),
            uniques: Vec::new(),
            slot_of: Vec::new(),
            unique_prefixes: slots,
            roots: 0,
            stats: GlomStats::default(),
            audit: AuditLog::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn is_unique_prefix(&self, prefix: &str) -> bool {
        self.unique_prefixes.contains_key(prefix)
    }

    fn prefix_name(&self, slot: UniqueSlot) -> &str {
        self.unique_prefixes
            .iter()
            .find(|(_, s)| **s == slot)
            .map(|(p, _)| p.as_str())
            .unwrap_or("?")
    }

    /// Register an identifier as (at least) a singleton clique.
    pub fn add_identifier(&mut self, id: &str) -> CliqueId {
        let ident = self.intern(id);
        CliqueId(self.find_mut(ident.raw()))
    }

    fn intern(&mut self, id: &str) -> IdentId {
        let (ident, is_new) = self.interner.intern(id);
        if is_new {
            let raw = ident.raw();
            let slot = curie::prefix(id).and_then(|p| self.unique_prefixes.get(p).copied());
            self.parent.push(raw);
            self.size.push(1);
            self.members.push(vec![ident]);
            self.uniques
                .push(slot.map(|s| vec![(s, ident)]).unwrap_or_default());
            self.slot_of.push(slot);
            self.roots += 1;
        }
        ident
    }

    fn find(&self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            x = self.parent[x as usize];
        }
        x
    }

    fn find_mut(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    /// Merge one equivalence group.
    pub fn merge<I, S>(&mut self, group: I) -> MergeOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group: Vec<String> = group.into_iter().map(|s| s.as_ref().to_string()).collect();
        if group.is_empty() {
            return MergeOutcome::Empty;
        }
        self.stats.groups += 1;

        let mut roots: Vec<u32> = Vec::with_capacity(group.len());
        for id in &group {
            let ident = self.intern(id);
            let root = self.find_mut(ident.raw());
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        if roots.len() == 1 {
            self.stats.already_merged += 1;
            return MergeOutcome::AlreadyMerged {
                clique: CliqueId(roots[0]),
            };
        }

        if let Some(conflict) = self.unique_conflict(&roots, &group) {
            self.stats.rejected += 1;
            warn!(
                prefixes = %conflict.prefixes.join(","),
                identifiers = %conflict.identifiers.join(","),
                "rejecting glom group: unique prefix would repeat"
            );
            self.audit.record(
                AuditKind::UniquePrefixConflict,
                conflict.to_string(),
                conflict.identifiers.clone(),
            );
            return MergeOutcome::Rejected(conflict);
        }

        // Largest clique absorbs the rest.
        let mut target = roots[0];
        for &r in &roots[1..] {
            if self.size[r as usize] > self.size[target as usize] {
                target = r;
            }
        }
        for &r in &roots {
            if r == target {
                continue;
            }
            self.parent[r as usize] = target;
            self.size[target as usize] += self.size[r as usize];
            let moved = std::mem::take(&mut self.members[r as usize]);
            self.members[target as usize].extend(moved);
            let moved = std::mem::take(&mut self.uniques[r as usize]);
            self.uniques[target as usize].extend(moved);
            self.roots -= 1;
        }

        self.stats.merged += 1;
        let size = self.size[target as usize] as usize;
        debug!(size, touched = roots.len(), "glommed group");
        MergeOutcome::Merged {
            clique: CliqueId(target),
            size,
        }
    }

    fn unique_conflict(&self, roots: &[u32], group: &[String]) -> Option<UniquePrefixConflict> {
        let mut holders: AHashMap<UniqueSlot, Vec<IdentId>> = AHashMap::new();
        for &r in roots {
            for &(slot, ident) in &self.uniques[r as usize] {
                let ids = holders.entry(slot).or_default();
                if !ids.contains(&ident) {
                    ids.push(ident);
                }
            }
        }

        let mut prefixes = Vec::new();
        let mut identifiers = Vec::new();
        for (slot, ids) in holders {
            if ids.len() < 2 {
                continue;
            }
            prefixes.push(self.prefix_name(slot).to_string());
            identifiers.extend(ids.iter().filter_map(|i| self.interner.lookup(*i)).map(str::to_string));
        }
        if prefixes.is_empty() {
            return None;
        }
        prefixes.sort();
        identifiers.sort();
        Some(UniquePrefixConflict {
            prefixes,
            identifiers,
            group: group.to_vec(),
        })
    }

    /// Merge every group in order, returning how many were rejected.
    pub fn merge_all<G, I, S>(&mut self, groups: G) -> u64
    where
        G: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.stats.rejected;
        for group in groups {
            self.merge(group);
        }
        self.stats.rejected - before
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn clique_of(&self, id: &str) -> Option<CliqueId> {
        let ident = self.interner.id_of(id)?;
        Some(CliqueId(self.find(ident.raw())))
    }

    pub fn same_clique(&self, a: &str, b: &str) -> bool {
        match (self.clique_of(a), self.clique_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Members of a clique, in the order they joined it.
    pub fn members(&self, clique: CliqueId) -> Vec<&str> {
        let root = self.find(clique.0);
        self.members[root as usize]
            .iter()
            .filter_map(|i| self.interner.lookup(*i))
            .collect()
    }

    /// Members of the clique containing `id`.
    pub fn members_of(&self, id: &str) -> Option<Vec<&str>> {
        self.clique_of(id).map(|c| self.members(c))
    }

    /// Every clique exactly once.
    pub fn cliques(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        (0..self.parent.len() as u32)
            .filter(move |&i| self.parent[i as usize] == i)
            .map(move |root| self.members(CliqueId(root)))
    }

    /// Every identifier ever passed to this engine.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.interner.iter().map(|(_, s)| s)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.interner.id_of(id).is_some()
    }

    /// Number of identifiers.
    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    pub fn clique_count(&self) -> usize {
        self.roots
    }

    pub fn stats(&self) -> GlomStats {
        self.stats
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn take_audit(&mut self) -> AuditLog {
        std::mem::take(&mut self.audit)
    }

    /// Check the partition and unique-prefix invariants.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut seen = vec![false; self.parent.len()];
        let mut roots = 0usize;
        for root in 0..self.parent.len() as u32 {
            if self.parent[root as usize] != root {
                if !self.members[root as usize].is_empty() {
                    return Err(format!("non-root {root} still owns members"));
                }
                continue;
            }
            roots += 1;
            let members = &self.members[root as usize];
            if members.len() != self.size[root as usize] as usize {
                return Err(format!("root {root}: size does not match member list"));
            }
            let mut slots: Vec<UniqueSlot> = Vec::new();
            for m in members {
                if seen[m.index()] {
                    return Err(format!("identifier {} listed twice", m.raw()));
                }
                seen[m.index()] = true;
                if self.find(m.raw()) != root {
                    return Err(format!("identifier {} does not resolve to its clique", m.raw()));
                }
                if let Some(slot) = self.slot_of[m.index()] {
                    if slots.contains(&slot) {
                        return Err(format!("root {root}: unique prefix {} repeated", self.prefix_name(slot)));
                    }
                    slots.push(slot);
                }
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(format!("identifier {missing} belongs to no clique"));
        }
        if roots != self.roots {
            return Err(format!("root count {} != tracked {}", roots, self.roots));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sorted(members: Vec<&str>) -> Vec<String> {
        let mut v: Vec<String> = members.into_iter().map(str::to_string).collect();
        v.sort();
        v
    }

    #[test]
    fn pairs_glom_transitively() {
        let mut glom = GlomEngine::default();
        glom.merge(["1:1", "1:2"]);
        glom.merge(["1:2", "1:3"]);
        glom.merge(["1:4", "1:5"]);

        assert_eq!(glom.len(), 5);
        assert_eq!(glom.clique_count(), 2);
        assert!(glom.same_clique("1:1", "1:3"));
        assert!(!glom.same_clique("1:1", "1:4"));
        assert_eq!(sorted(glom.members_of("1:2").unwrap()), vec!["1:1", "1:2", "1:3"]);
        assert_eq!(sorted(glom.members_of("1:5").unwrap()), vec!["1:4", "1:5"]);
        glom.check_invariants().unwrap();
    }

    #[test]
    fn larger_groups_merge_in_one_call() {
        let mut glom = GlomEngine::default();
        let outcome = glom.merge(["A:1", "B:1", "C:1", "D:1"]);
        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                clique: glom.clique_of("A:1").unwrap(),
                size: 4
            }
        );
        assert_eq!(glom.clique_count(), 1);
    }

    #[test]
    fn unique_prefix_blocks_second_merge_through_shared_member() {
        let mut glom = GlomEngine::new(["A1"]);
        assert!(matches!(glom.merge(["A1:x", "B:1"]), MergeOutcome::Merged { .. }));

        let outcome = glom.merge(["A1:y", "B:1"]);
        let MergeOutcome::Rejected(conflict) = outcome else {
            panic!("expected rejection, got {outcome:?}");
        };
        assert_eq!(conflict.prefixes, vec!["A1"]);
        assert_eq!(conflict.identifiers, vec!["A1:x", "A1:y"]);

        assert!(glom.same_clique("A1:x", "B:1"));
        assert!(!glom.same_clique("A1:y", "B:1"));
        assert_eq!(glom.members_of("A1:y").unwrap(), vec!["A1:y"]);
        assert_eq!(glom.stats().rejected, 1);
        assert_eq!(glom.audit().count(AuditKind::UniquePrefixConflict), 1);
        glom.check_invariants().unwrap();
    }

    #[test]
    fn rejection_is_all_or_nothing_for_the_group() {
        let mut glom = GlomEngine::new(["GO"]);
        glom.merge(["GO:1", "X:1"]);
        // X:2 and X:3 would be fine on their own, but GO:2 poisons the group.
        let outcome = glom.merge(["X:2", "X:3", "GO:2", "X:1"]);
        assert!(outcome.is_rejected());
        assert!(!glom.same_clique("X:2", "X:3"));
        assert!(!glom.same_clique("X:1", "X:2"));
        assert_eq!(glom.members_of("X:1").map(sorted), Some(vec!["GO:1".to_string(), "X:1".to_string()]));
        // Unseen members of a rejected group are still registered.
        assert!(glom.contains("X:3"));
        glom.check_invariants().unwrap();
    }

    #[test]
    fn conflict_inside_a_single_group_is_rejected() {
        let mut glom = GlomEngine::new(["UBERON"]);
        let outcome = glom.merge(["UBERON:1", "UBERON:2", "FMA:9"]);
        assert!(outcome.is_rejected());
        assert_eq!(glom.clique_count(), 3);
    }

    #[test]
    fn repeated_identifier_is_not_a_conflict() {
        let mut glom = GlomEngine::new(["UBERON"]);
        glom.merge(["UBERON:1", "FMA:9"]);
        let outcome = glom.merge(["UBERON:1", "FMA:9", "UBERON:1"]);
        assert!(matches!(outcome, MergeOutcome::AlreadyMerged { .. }));
        let outcome = glom.merge(["UBERON:1", "MESH:1"]);
        assert!(matches!(outcome, MergeOutcome::Merged { size: 3, .. }));
    }

    #[test]
    fn non_unique_prefixes_may_repeat() {
        let mut glom = GlomEngine::new(["CHEBI"]);
        glom.merge(["MESH:1", "MESH:2"]);
        glom.merge(["MESH:2", "CHEBI:7"]);
        assert_eq!(glom.clique_count(), 1);
    }

    #[test]
    fn singletons_and_empty_groups() {
        let mut glom = GlomEngine::default();
        glom.add_identifier("CLO:0000001");
        assert!(matches!(glom.merge(["CLO:0000002"]), MergeOutcome::AlreadyMerged { .. }));
        assert_eq!(glom.merge(Vec::<String>::new()), MergeOutcome::Empty);
        assert_eq!(glom.clique_count(), 2);
        assert_eq!(glom.stats().groups, 1);
    }

    #[test]
    fn merging_the_same_group_twice_is_idempotent() {
        let mut once = GlomEngine::new(["A"]);
        once.merge(["A:1", "B:1"]);
        once.merge(["B:1", "C:1"]);

        let mut twice = GlomEngine::new(["A"]);
        for _ in 0..2 {
            twice.merge(["A:1", "B:1"]);
            twice.merge(["B:1", "C:1"]);
        }

        let partition = |g: &GlomEngine| -> BTreeSet<Vec<String>> { g.cliques().map(sorted).collect() };
        assert_eq!(partition(&once), partition(&twice));
        assert_eq!(twice.stats().already_merged, 2);
    }

    #[test]
    fn cliques_lists_each_clique_once() {
        let mut glom = GlomEngine::default();
        glom.merge(["A:1", "B:1"]);
        glom.merge(["B:1", "C:1"]);
        glom.add_identifier("D:1");
        let cliques: Vec<Vec<String>> = glom.cliques().map(sorted).collect();
        assert_eq!(cliques.len(), 2);
        let total: usize = cliques.iter().map(Vec::len).sum();
        assert_eq!(total, glom.len());
    }

    #[test]
    fn deep_chains_stay_consistent() {
        let mut glom = GlomEngine::default();
        for i in 0..500 {
            glom.merge([format!("N:{i}"), format!("N:{}", i + 1)]);
        }
        assert_eq!(glom.clique_count(), 1);
        assert_eq!(glom.members_of("N:250").unwrap().len(), 501);
        glom.check_invariants().unwrap();
    }
}
