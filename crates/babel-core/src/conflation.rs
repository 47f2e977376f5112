//! Conflation: linking finished cliques across compendia.
//!
//! Each compendium is reduced to an `identifier -> leader` index. Concordance
//! pairs are resolved side by side against those indices, and the surviving
//! leader pairs are glommed in a fresh engine with no unique prefixes. Every
//! resulting group of two or more leaders is one conflation record.
//!
//! ```text
//!   Drug:      {RXCUI:5, NDC:1}            leader RXCUI:5
//!   Chemical:  {CHEBI:7, UNII:Q, RXCUI:9}  leader CHEBI:7
//!   pair (NDC:1, UNII:Q)  ->  ["RXCUI:5", "CHEBI:7"]
//! ```

use crate::audit::{AuditKind, AuditLog};
use crate::compendium::{CompendiumReader, CompendiumRecord};
use crate::concordance::ConcordanceTriple;
use crate::config::ConflationConfig;
use crate::curie;
use crate::error::{BabelError, Result};
use crate::glom::GlomEngine;
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Leaders of co-referent cliques, best compendium first.
pub type ConflationRecord = Vec<String>;

// ============================================================================
// Per-compendium index
// ============================================================================

/// `identifier -> leader` for one compendium.
#[derive(Debug, Clone, Default)]
pub struct CompendiumIndex {
    name: String,
    leaders: AHashMap<String, String>,
    cliques: usize,
}

impl CompendiumIndex {
    /// Index a stream of records. Only members whose prefix is listed in
    /// `index_prefixes` are indexed; an empty list indexes everything.
    /// Repeated members are caught within a record and among indexed
    /// identifiers.
    pub fn from_records<I>(name: impl Into<String>, records: I, index_prefixes: &[String]) -> Result<Self>
    where
        I: IntoIterator<Item = Result<CompendiumRecord>>,
    {
        let name = name.into();
        let mut index = Self {
            name,
            ..Self::default()
        };
        for (i, record) in records.into_iter().enumerate() {
            index.insert(&record?, i + 1, index_prefixes)?;
        }
        Ok(index)
    }

    /// Index a compendium file, named after its path.
    pub fn load(path: &Path, index_prefixes: &[String]) -> Result<Self> {
        let mut index = Self {
            name: path.display().to_string(),
            ..Self::default()
        };
        let mut reader = CompendiumReader::open(path)?;
        while let Some(record) = reader.next() {
            index.insert(&record?, reader.line(), index_prefixes)?;
        }
        info!(
            compendium = %index.name,
            cliques = index.cliques,
            indexed = index.leaders.len(),
            "indexed compendium"
        );
        Ok(index)
    }

    fn insert(&mut self, record: &CompendiumRecord, line: usize, index_prefixes: &[String]) -> Result<()> {
        let Some(leader) = record.leader() else {
            return Err(BabelError::EmptyClique {
                compendium: self.name.clone(),
                line,
            });
        };
        self.cliques += 1;
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(record.identifiers.len());
        for id in record.ids() {
            if !seen.insert(id) || self.leaders.contains_key(id) {
                return Err(BabelError::DuplicateMember {
                    compendium: self.name.clone(),
                    identifier: id.to_string(),
                });
            }
            let indexed = index_prefixes.is_empty()
                || curie::prefix(id).is_some_and(|p| index_prefixes.iter().any(|x| x == p));
            if indexed {
                self.leaders.insert(id.to_string(), leader.to_string());
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leader_of(&self, id: &str) -> Option<&str> {
        self.leaders.get(id).map(String::as_str)
    }

    /// Number of records indexed.
    pub fn clique_count(&self) -> usize {
        self.cliques
    }

    /// Number of identifiers indexed.
    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// How a concordance pair related to the loaded compendia.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairClass {
    /// Leaders from two different compendia.
    CrossType,
    /// Two distinct leaders of the same compendium.
    WithinType,
    /// Both sides already share a leader.
    SelfPair,
    /// At least one side is in no compendium.
    Unresolved,
}

impl PairClass {
    pub fn is_accepted(self) -> bool {
        matches!(self, PairClass::CrossType | PairClass::WithinType)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflationStats {
    pub pairs: u64,
    pub unresolved: u64,
    pub self_pairs: u64,
    pub cross_type: u64,
    pub within_type: u64,
    pub collisions: u64,
    pub records: u64,
}

/// Result of a finished conflation.
#[derive(Debug, Clone)]
pub struct Conflation {
    pub records: Vec<ConflationRecord>,
    pub stats: ConflationStats,
    pub audit: AuditLog,
}

pub struct ConflationBuilder {
    index_prefixes: Vec<String>,
    /// Names of the compendia loaded so far, in supply order.
    compendia: Vec<String>,
    /// identifier -> (compendium position, leader); first compendium wins.
    leaders: AHashMap<String, (usize, String)>,
    /// leader -> compendium position, for ordering output records.
    origin: AHashMap<String, usize>,
    glom: GlomEngine,
    stats: ConflationStats,
    audit: AuditLog,
}

impl ConflationBuilder {
    pub fn new(config: &ConflationConfig) -> Self {
        Self {
            index_prefixes: config.index_prefixes.clone(),
            compendia: Vec::new(),
            leaders: AHashMap::new(),
            origin: AHashMap::new(),
            glom: GlomEngine::default(),
            stats: ConflationStats::default(),
            audit: AuditLog::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn index_prefixes(&self) -> &[String] {
        &self.index_prefixes
    }

    /// Add one compendium index. Returns `false` (and does nothing) if a
    /// compendium of the same name was already added.
    pub fn add_index(&mut self, index: CompendiumIndex) -> bool {
        if self.compendia.iter().any(|c| c == index.name()) {
            debug!(compendium = %index.name(), "compendium supplied twice; keeping first");
            return false;
        }
        let position = self.compendia.len();
        self.compendia.push(index.name.clone());

        for (id, leader) in index.leaders {
            if let Some((first, kept)) = self.leaders.get(&id) {
                self.stats.collisions += 1;
                let detail = format!(
                    "{id} is in {} (leader {kept}) and {} (leader {leader})",
                    self.compendia[*first], index.name
                );
                warn!(identifier = %id, kept = %kept, dropped = %leader, "identifier in more than one compendium");
                self.audit
                    .record(AuditKind::CrossCompendiumCollision, detail, vec![id, leader]);
                continue;
            }
            self.leaders.insert(id, (position, leader));
        }
        true
    }

    /// Index and add in-memory records.
    pub fn add_records<I>(&mut self, name: impl Into<String>, records: I) -> Result<bool>
    where
        I: IntoIterator<Item = CompendiumRecord>,
    {
        let index = CompendiumIndex::from_records(name, records.into_iter().map(Ok), &self.index_prefixes)?;
        Ok(self.add_index(index))
    }

    /// Load compendium files in parallel and add them in the order given.
    /// Paths repeated in the list are loaded once. Returns how many
    /// compendia were added.
    pub fn load_compendia(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let mut unique: Vec<&PathBuf> = Vec::with_capacity(paths.len());
        let mut seen: AHashSet<PathBuf> = AHashSet::new();
        for path in paths {
            let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                unique.push(path);
            } else {
                debug!(path = %path.display(), "skipping repeated compendium");
            }
        }

        let prefixes = &self.index_prefixes;
        let indices: Vec<CompendiumIndex> = unique
            .par_iter()
            .map(|path| CompendiumIndex::load(path, prefixes))
            .collect::<Result<_>>()?;

        let mut added = 0;
        for index in indices {
            if self.add_index(index) {
                added += 1;
            }
        }
        Ok(added)
    }

    fn resolve(&self, id: &str) -> Option<(usize, &str)> {
        self.leaders.get(id).map(|(pos, leader)| (*pos, leader.as_str()))
    }

    /// Resolve and classify one pair, merging it if accepted.
    pub fn add_pair(&mut self, a: &str, b: &str) -> PairClass {
        self.stats.pairs += 1;
        let (Some((pa, la)), Some((pb, lb))) = (self.resolve(a), self.resolve(b)) else {
            self.stats.unresolved += 1;
            return PairClass::Unresolved;
        };
        let (la, lb) = (la.to_string(), lb.to_string());
        if la == lb {
            self.stats.self_pairs += 1;
            return PairClass::SelfPair;
        }
        let class = if pa == pb {
            self.stats.within_type += 1;
            PairClass::WithinType
        } else {
            self.stats.cross_type += 1;
            PairClass::CrossType
        };
        self.origin.entry(la.clone()).or_insert(pa);
        self.origin.entry(lb.clone()).or_insert(pb);
        self.glom.merge([la, lb]);
        class
    }

    pub fn add_concordance<'a, I>(&mut self, triples: I)
    where
        I: IntoIterator<Item = &'a ConcordanceTriple>,
    {
        for t in triples {
            self.add_pair(&t.subject, &t.object);
        }
    }

    pub fn stats(&self) -> ConflationStats {
        self.stats
    }

    fn leader_order(&self, a: &str, b: &str) -> Ordering {
        let rank = |l: &str| self.origin.get(l).copied().unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    }

    pub fn finish(mut self) -> Conflation {
        let mut records: Vec<ConflationRecord> = self
            .glom
            .cliques()
            .filter(|members| members.len() >= 2)
            .map(|mut members| {
                members.sort_by(|a, b| self.leader_order(a, b));
                members.into_iter().map(str::to_string).collect()
            })
            .collect();
        records.sort_by(|a, b| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| self.leader_order(x, y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len()))
        });
        self.stats.records = records.len() as u64;

        info!(
            compendia = self.compendia.len(),
            pairs = self.stats.pairs,
            unresolved = self.stats.unresolved,
            self_pairs = self.stats.self_pairs,
            cross_type = self.stats.cross_type,
            within_type = self.stats.within_type,
            records = self.stats.records,
            "conflation finished"
        );
        Conflation {
            records,
            stats: self.stats,
            audit: self.audit,
        }
    }
}

// ============================================================================
// Conflation files
// ============================================================================

pub fn write_conflations<W: Write>(mut writer: W, records: &[ConflationRecord]) -> Result<usize> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}

pub fn write_conflation_file(path: &Path, records: &[ConflationRecord]) -> Result<usize> {
    let file = File::create(path).map_err(|e| BabelError::file(path, e))?;
    write_conflations(BufWriter::new(file), records)
}

pub fn read_conflations<R: BufRead>(reader: R) -> Result<Vec<ConflationRecord>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}
