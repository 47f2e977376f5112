//! RXNREL -> concordance.
//!
//! Rows pass through four gates in order: predicate allow-list, resolution
//! of both sides, self-pair removal and the single-use filter. Unfiltered
//! predicates are emitted as they are read; filtered ones after the last
//! row.

use crate::error::{Result, RxnormError};
use crate::index::ConceptIndex;
use crate::resolve::resolve;
use crate::rrf::{ConceptRef, RelRow};
use crate::single_use::SingleUseFilter;
use babel_core::audit::{AuditKind, AuditLog};
use babel_core::concordance::ConcordanceTriple;
use babel_core::config::{AmbiguityPolicy, RxnormConfig};
use babel_core::BabelError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcordStats {
    pub rows: u64,
    pub skipped_predicate: u64,
    pub unresolved: u64,
    pub ambiguous: u64,
    pub self_pairs: u64,
    pub single_use_dropped: u64,
    pub emitted: u64,
}

#[derive(Debug, Clone)]
pub struct RxnormConcordance {
    pub triples: Vec<ConcordanceTriple>,
    pub stats: ConcordStats,
    pub audit: AuditLog,
}

pub struct ConcordanceBuilder<'a> {
    config: &'a RxnormConfig,
    index: &'a ConceptIndex,
    filter: SingleUseFilter,
    triples: Vec<ConcordanceTriple>,
    stats: ConcordStats,
    audit: AuditLog,
}

impl<'a> ConcordanceBuilder<'a> {
    pub fn new(config: &'a RxnormConfig, index: &'a ConceptIndex) -> Self {
        Self {
            config,
            index,
            filter: SingleUseFilter::new(&config.single_use_predicates),
            triples: Vec::new(),
            stats: ConcordStats::default(),
            audit: AuditLog::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    fn curie(&self, concept: &str) -> String {
        format!("{}:{}", self.config.curie_prefix, concept)
    }

    /// Resolve one side of a row. `Ok(None)` means the row is to be skipped.
    fn side(&mut self, row: &RelRow<'_>, reference: Result<ConceptRef<'_>>) -> Result<Option<String>> {
        match resolve(reference?, self.index) {
            Ok(cui) => Ok(Some(cui.to_string())),
            Err(err) if err.is_lookup_miss() => {
                self.stats.unresolved += 1;
                debug!(line = row.line, error = %err, "skipping row with unresolved reference");
                self.audit
                    .record(AuditKind::UnresolvedReference, format!("line {}: {err}", row.line), Vec::new());
                Ok(None)
            }
            Err(err @ RxnormError::AmbiguousSourceDescriptor { .. })
                if self.config.ambiguity_policy == AmbiguityPolicy::Abort =>
            {
                Err(err)
            }
            Err(RxnormError::AmbiguousSourceDescriptor { sab, aui, concepts }) => {
                self.stats.ambiguous += 1;
                warn!(
                    line = row.line,
                    %sab,
                    %aui,
                    candidates = concepts.len(),
                    "rejecting row with ambiguous source descriptor"
                );
                let detail = format!("line {}: ({sab}, {aui}) matches {} concepts", row.line, concepts.len());
                let ids = concepts.iter().map(|c| self.curie(c)).collect();
                self.audit.record(AuditKind::AmbiguousSourceDescriptor, detail, ids);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Process one RXNREL line (without its newline).
    pub fn process_line(&mut self, line: &str, line_no: usize, source_name: &str) -> Result<()> {
        let row = RelRow::parse(line, line_no, source_name)?;
        self.stats.rows += 1;
        if !self.config.allowed_predicates.iter().any(|p| p == row.predicate) {
            self.stats.skipped_predicate += 1;
            return Ok(());
        }

        let Some(object) = self.side(&row, row.object())? else {
            return Ok(());
        };
        let Some(subject) = self.side(&row, row.subject())? else {
            return Ok(());
        };
        if subject == object {
            self.stats.self_pairs += 1;
            return Ok(());
        }

        if !self.filter.observe(&subject, row.predicate, &object) {
            let triple = ConcordanceTriple::new(self.curie(&subject), row.predicate, self.curie(&object));
            self.triples.push(triple);
        }
        Ok(())
    }

    pub fn process_reader<R: BufRead>(&mut self, reader: R, source_name: &str) -> Result<()> {
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            self.process_line(line, i + 1, source_name)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> RxnormConcordance {
        let deferred = self.filter.finish(&mut self.audit);
        self.stats.single_use_dropped = deferred.dropped;
        for e in deferred.emitted {
            let triple = ConcordanceTriple::new(
                format!("{}:{}", self.config.curie_prefix, e.subject),
                e.predicate,
                format!("{}:{}", self.config.curie_prefix, e.object),
            );
            self.triples.push(triple);
        }
        self.stats.emitted = self.triples.len() as u64;

        info!(
            rows = self.stats.rows,
            emitted = self.stats.emitted,
            unresolved = self.stats.unresolved,
            ambiguous = self.stats.ambiguous,
            self_pairs = self.stats.self_pairs,
            single_use_dropped = self.stats.single_use_dropped,
            "built rxnorm concordance"
        );
        RxnormConcordance {
            triples: self.triples,
            stats: self.stats,
            audit: self.audit,
        }
    }
}

/// Build a concordance from an RXNREL stream against a prebuilt index.
pub fn build_concordance<R: BufRead>(
    config: &RxnormConfig,
    index: &ConceptIndex,
    rel: R,
    source_name: &str,
    audit: AuditLog,
) -> Result<RxnormConcordance> {
    let mut builder = ConcordanceBuilder::new(config, index).with_audit(audit);
    builder.process_reader(rel, source_name)?;
    Ok(builder.finish())
}

/// Build a concordance from RXNCONSO and RXNREL files.
pub fn build_concordance_files(
    config: &RxnormConfig,
    conso: &Path,
    rel: &Path,
    audit: AuditLog,
) -> Result<RxnormConcordance> {
    let index = ConceptIndex::load(conso)?;
    let file = File::open(rel).map_err(|e| BabelError::file(rel, e))?;
    build_concordance(config, &index, BufReader::new(file), &rel.display().to_string(), audit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// An RXNREL row reading `subject predicate object`.
    fn rel(subject: (&str, &str, &str), predicate: &str, object: (&str, &str, &str), sab: &str) -> String {
        let (sm, sc, sa) = subject;
        let (om, oc, oa) = object;
        format!("{oc}|{oa}|{om}|RO|{sc}|{sa}|{sm}|{predicate}|R1||{sab}|{sab}||||N||\n")
    }

    fn cui(id: &str) -> (&str, &str, &str) {
        ("CUI", id, "")
    }

    fn pairs(out: &RxnormConcordance) -> Vec<(String, String, String)> {
        out.triples
            .iter()
            .map(|t| (t.subject.clone(), t.predicate.clone(), t.object.clone()))
            .collect()
    }

    fn run(config: &RxnormConfig, index: &ConceptIndex, rows: &str) -> Result<RxnormConcordance> {
        build_concordance(config, index, Cursor::new(rows.to_string()), "RXNREL.RRF", AuditLog::default())
    }

    #[test]
    fn multi_ingredient_subject_is_dropped() {
        let rows = [
            rel(cui("1"), "has_ingredient", cui("2"), "RXNORM"),
            rel(cui("1"), "has_ingredient", cui("3"), "RXNORM"),
            rel(cui("4"), "has_tradename", cui("5"), "RXNORM"),
        ]
        .concat();
        let out = run(&RxnormConfig::default(), &ConceptIndex::new(), &rows).unwrap();
        assert_eq!(
            pairs(&out),
            vec![("RXCUI:4".to_string(), "has_tradename".to_string(), "RXCUI:5".to_string())]
        );
        assert_eq!(out.stats.single_use_dropped, 1);
        assert_eq!(out.audit.count(AuditKind::SingleUseDropped), 1);
    }

    #[test]
    fn unfiltered_predicates_emit_immediately_and_first() {
        let rows = [
            rel(cui("10"), "has_tradename", cui("11"), "RXNORM"),
            rel(cui("7"), "has_form", cui("8"), "RXNORM"),
            rel(cui("7"), "has_form", cui("9"), "RXNORM"),
        ]
        .concat();
        let out = run(&RxnormConfig::default(), &ConceptIndex::new(), &rows).unwrap();
        let subjects: Vec<String> = out.triples.iter().map(|t| t.subject.clone()).collect();
        assert_eq!(subjects, vec!["RXCUI:7", "RXCUI:7", "RXCUI:10"]);
    }

    #[test]
    fn other_predicates_and_self_pairs_are_skipped() {
        let rows = [
            rel(cui("1"), "inverse_isa", cui("2"), "RXNORM"),
            rel(("BOGUS", "1", ""), "tradename_of", cui("2"), "RXNORM"),
            rel(cui("3"), "has_form", cui("3"), "RXNORM"),
        ]
        .concat();
        let out = run(&RxnormConfig::default(), &ConceptIndex::new(), &rows).unwrap();
        assert!(out.triples.is_empty());
        assert_eq!(out.stats.skipped_predicate, 2);
        assert_eq!(out.stats.self_pairs, 1);
    }

    #[test]
    fn atoms_resolve_and_misses_are_counted() {
        let mut index = ConceptIndex::new();
        index.insert_atom("20", "A20").unwrap();
        let rows = [
            rel(cui("21"), "has_form", ("AUI", "", "A20"), "RXNORM"),
            rel(cui("22"), "has_form", ("AUI", "", "A404"), "RXNORM"),
        ]
        .concat();
        let out = run(&RxnormConfig::default(), &index, &rows).unwrap();
        assert_eq!(
            pairs(&out),
            vec![("RXCUI:21".to_string(), "has_form".to_string(), "RXCUI:20".to_string())]
        );
        assert_eq!(out.stats.unresolved, 1);
        assert_eq!(out.audit.count(AuditKind::UnresolvedReference), 1);
    }

    #[test]
    fn ambiguous_descriptor_aborts_by_default() {
        let mut index = ConceptIndex::new();
        index.insert_descriptor("30", "MTHSPL", "A30");
        index.insert_descriptor("31", "MTHSPL", "A30");
        let rows = rel(cui("32"), "has_tradename", ("SDUI", "", "A30"), "MTHSPL");
        let err = run(&RxnormConfig::default(), &index, &rows).unwrap_err();
        assert!(matches!(err, RxnormError::AmbiguousSourceDescriptor { .. }));
    }

    #[test]
    fn ambiguous_descriptor_can_skip_the_row_without_picking() {
        let mut index = ConceptIndex::new();
        index.insert_descriptor("30", "MTHSPL", "A30");
        index.insert_descriptor("31", "MTHSPL", "A30");
        index.insert_descriptor("33", "MTHSPL", "A33");
        let config = RxnormConfig {
            ambiguity_policy: AmbiguityPolicy::SkipRow,
            ..RxnormConfig::default()
        };
        let rows = [
            rel(cui("32"), "has_tradename", ("SDUI", "", "A30"), "MTHSPL"),
            rel(cui("34"), "has_tradename", ("SDUI", "", "A33"), "MTHSPL"),
        ]
        .concat();
        let out = run(&config, &index, &rows).unwrap();
        assert_eq!(
            pairs(&out),
            vec![("RXCUI:34".to_string(), "has_tradename".to_string(), "RXCUI:33".to_string())]
        );
        assert_eq!(out.stats.ambiguous, 1);
        let examples = out.audit.examples(AuditKind::AmbiguousSourceDescriptor);
        assert_eq!(examples[0].identifiers, ["RXCUI:30", "RXCUI:31"]);
    }

    #[test]
    fn sdui_side_resolves_through_source_and_rxaui() {
        let conso = "\
5|ENG||||||A5|||D5|MTHSPL|SU|5|Advil||N||
6|ENG||||||A6|||D5|GS|SU|6|Motrin||N||
";
        let index = ConceptIndex::from_reader(Cursor::new(conso), "conso").unwrap();
        let rows = [
            rel(cui("4"), "has_tradename", ("SDUI", "", "A5"), "MTHSPL"),
            // Same RXAUI under another source does not match.
            rel(cui("7"), "has_tradename", ("SDUI", "", "A5"), "GS"),
            // The SDUI column value is not an index key.
            rel(cui("8"), "has_tradename", ("SDUI", "", "D5"), "MTHSPL"),
        ]
        .concat();
        let out = run(&RxnormConfig::default(), &index, &rows).unwrap();
        assert_eq!(
            pairs(&out),
            vec![("RXCUI:4".to_string(), "has_tradename".to_string(), "RXCUI:5".to_string())]
        );
        assert_eq!(out.stats.unresolved, 2);
    }

    #[test]
    fn unknown_addressing_mode_is_fatal_for_allowed_predicates() {
        let rows = rel(cui("1"), "has_form", ("CODE", "2", ""), "RXNORM");
        let err = run(&RxnormConfig::default(), &ConceptIndex::new(), &rows).unwrap_err();
        assert!(matches!(err, RxnormError::UnknownAddressingMode { line: 1, .. }));
    }

    #[test]
    fn curie_prefix_is_configurable() {
        let config = RxnormConfig {
            curie_prefix: "RXNORM".to_string(),
            ..RxnormConfig::default()
        };
        let rows = rel(cui("1"), "has_form", cui("2"), "RXNORM");
        let out = run(&config, &ConceptIndex::new(), &rows).unwrap();
        assert_eq!(out.triples[0].subject, "RXNORM:1");
    }
}
