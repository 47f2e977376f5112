//! Compendium files: one clique per line, newline-delimited JSON.
//!
//! ```json
//! {"identifiers":[{"i":"CHEBI:15365","l":"aspirin"},{"i":"UNII:R16CO5Y76E"}],
//!  "preferred_name":"aspirin","type":"biolink:ChemicalEntity","ic":84.5}
//! ```
//!
//! The first identifier of every record is the clique leader. Leaders are
//! chosen by a fixed prefix ranking with a lexicographic tie-break, so the
//! same cliques always produce the same leaders; the conflation pass keys
//! on them.

use crate::config::CompendiumConfig;
use crate::curie::PrefixRanking;
use crate::error::{BabelError, Result};
use crate::glom::GlomEngine;
use crate::metadata::{open, NodeMetadata};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufWriter, Lines, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompendiumIdentifier {
    #[serde(rename = "i")]
    pub id: String,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "d", default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompendiumRecord {
    pub identifiers: Vec<CompendiumIdentifier>,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(rename = "type")]
    pub semantic_type: String,
    #[serde(default)]
    pub ic: Option<f64>,
}

impl CompendiumRecord {
    pub fn leader(&self) -> Option<&str> {
        self.identifiers.first().map(|i| i.id.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|i| i.id.as_str())
    }
}

/// Turns finished cliques into ordered compendium records.
pub struct CompendiumWriter<'a> {
    semantic_type: &'a str,
    leader_ranking: PrefixRanking,
    label_ranking: PrefixRanking,
    metadata: &'a NodeMetadata,
}

impl<'a> CompendiumWriter<'a> {
    pub fn new(config: &'a CompendiumConfig, metadata: &'a NodeMetadata) -> Self {
        Self {
            semantic_type: &config.semantic_type,
            leader_ranking: PrefixRanking::new(&config.prefix_priority),
            label_ranking: PrefixRanking::new(config.label_priority()),
            metadata,
        }
    }

    /// Build the record for one clique. `members` must be non-empty.
    pub fn record_for<S: AsRef<str>>(&self, members: &[S]) -> CompendiumRecord {
        let mut ordered: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
        self.leader_ranking.sort(&mut ordered);
        ordered.dedup();

        let mut by_label_rank = ordered.clone();
        self.label_ranking.sort(&mut by_label_rank);
        let preferred_name = by_label_rank
            .iter()
            .find_map(|id| self.metadata.label(id).filter(|l| !l.trim().is_empty()))
            .map(str::to_string);

        let semantic_type = ordered
            .iter()
            .find_map(|id| self.metadata.type_of(id))
            .unwrap_or(self.semantic_type)
            .to_string();

        let ic = ordered
            .iter()
            .filter_map(|id| self.metadata.ic(id))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

        let identifiers = ordered
            .iter()
            .map(|id| CompendiumIdentifier {
                id: id.to_string(),
                label: self.metadata.label(id).map(str::to_string),
                descriptions: self.metadata.descriptions(id).to_vec(),
            })
            .collect();

        CompendiumRecord {
            identifiers,
            preferred_name,
            semantic_type,
            ic,
        }
    }

    /// Build one record per clique, sorted by leader, and check that every
    /// identifier in `universe` lands in exactly one record.
    pub fn build_records<'c, C, M, U>(&self, cliques: C, universe: U) -> Result<Vec<CompendiumRecord>>
    where
        C: IntoIterator<Item = M>,
        M: AsRef<[&'c str]>,
        U: IntoIterator<Item = &'c str>,
    {
        let mut records: Vec<CompendiumRecord> = cliques
            .into_iter()
            .filter(|m| !m.as_ref().is_empty())
            .map(|m| self.record_for(m.as_ref()))
            .collect();
        records.sort_by(|a, b| a.leader().cmp(&b.leader()));
        check_partition(&records, universe)?;
        Ok(records)
    }

    /// Records for every clique of a finished glom engine.
    pub fn records_from_glom(&self, glom: &GlomEngine) -> Result<Vec<CompendiumRecord>> {
        let records = self.build_records(glom.cliques(), glom.identifiers())?;
        info!(
            semantic_type = self.semantic_type,
            cliques = records.len(),
            identifiers = glom.len(),
            "built compendium records"
        );
        Ok(records)
    }
}

/// Every identifier of `universe` must occur in exactly one record.
pub fn check_partition<'c, U>(records: &[CompendiumRecord], universe: U) -> Result<()>
where
    U: IntoIterator<Item = &'c str>,
{
    let mut occurrences: AHashMap<&str, usize> = AHashMap::new();
    for record in records {
        for id in record.ids() {
            *occurrences.entry(id).or_insert(0) += 1;
        }
    }
    for record in records {
        for id in record.ids() {
            let n = occurrences.get(id).copied().unwrap_or(0);
            if n > 1 {
                return Err(BabelError::PartitionViolation {
                    identifier: id.to_string(),
                    occurrences: n,
                });
            }
        }
    }
    for id in universe {
        if !occurrences.contains_key(id) {
            return Err(BabelError::PartitionViolation {
                identifier: id.to_string(),
                occurrences: 0,
            });
        }
    }
    Ok(())
}

pub fn write_records<W: Write>(mut writer: W, records: &[CompendiumRecord]) -> Result<usize> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}

pub fn write_compendium_file(path: &Path, records: &[CompendiumRecord]) -> Result<usize> {
    let file = File::create(path).map_err(|e| BabelError::file(path, e))?;
    write_records(BufWriter::new(file), records)
}

/// Streams records back out of a compendium file.
pub struct CompendiumReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> CompendiumReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Line number of the most recently returned record.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl CompendiumReader<std::io::BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open(path)?))
    }
}

impl<R: BufRead> Iterator for CompendiumReader<R> {
    type Item = Result<CompendiumRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(BabelError::from));
        }
    }
}
