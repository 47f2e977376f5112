//! Concept indices built from RXNCONSO.

use crate::error::{Result, RxnormError};
use crate::rrf::ConsoRow;
use ahash::AHashMap;
use babel_core::BabelError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// `atom -> concept` and `(source, atom) -> concepts`.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    atom_to_concept: AHashMap<String, String>,
    /// Keyed by source abbreviation, then RXAUI. Concepts sorted.
    source_atom_to_concepts: AHashMap<String, AHashMap<String, Vec<String>>>,
}

impl ConceptIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that atom `aui` belongs to concept `cui`.
    ///
    /// Repeating a mapping is harmless; mapping one atom to a second concept
    /// is an error.
    pub fn insert_atom(&mut self, cui: &str, aui: &str) -> Result<()> {
        match self.atom_to_concept.get(aui) {
            Some(existing) if existing != cui => Err(RxnormError::DuplicateAtomMapping {
                atom: aui.to_string(),
                first: existing.clone(),
                second: cui.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.atom_to_concept.insert(aui.to_string(), cui.to_string());
                Ok(())
            }
        }
    }

    /// Record that atom `aui` asserted by source `sab` covers concept `cui`.
    pub fn insert_descriptor(&mut self, cui: &str, sab: &str, aui: &str) {
        let concepts = self
            .source_atom_to_concepts
            .entry(sab.to_string())
            .or_default()
            .entry(aui.to_string())
            .or_default();
        if let Err(pos) = concepts.binary_search_by(|c| c.as_str().cmp(cui)) {
            concepts.insert(pos, cui.to_string());
        }
    }

    /// Index one RXNCONSO row under its RXAUI, both alone and scoped by
    /// SAB. Rows with an empty atom column are skipped.
    pub fn insert_row(&mut self, row: &ConsoRow<'_>) -> Result<()> {
        if row.aui.is_empty() {
            return Ok(());
        }
        self.insert_atom(row.cui, row.aui)?;
        self.insert_descriptor(row.cui, row.sab, row.aui);
        Ok(())
    }

    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut index = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            index.insert_row(&ConsoRow::parse(line, i + 1, source_name)?)?;
        }
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| BabelError::file(path, e))?;
        let index = Self::from_reader(BufReader::new(file), &path.display().to_string())?;
        info!(
            path = %path.display(),
            atoms = index.atom_count(),
            descriptors = index.descriptor_count(),
            "indexed concept file"
        );
        Ok(index)
    }

    pub fn concept_of_atom(&self, aui: &str) -> Option<&str> {
        self.atom_to_concept.get(aui).map(String::as_str)
    }

    /// Concepts covered by `(sab, aui)`, sorted; empty when unknown.
    pub fn concepts_of_descriptor(&self, sab: &str, aui: &str) -> &[String] {
        self.source_atom_to_concepts
            .get(sab)
            .and_then(|by_atom| by_atom.get(aui))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn atom_count(&self) -> usize {
        self.atom_to_concept.len()
    }

    pub fn descriptor_count(&self) -> usize {
        self.source_atom_to_concepts.values().map(|by_atom| by_atom.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CONSO: &str = "\
161|ENG||||||A100||||RXNORM|IN|161|acetaminophen||N||
161|ENG||||||A101|||D1|MTHSPL|SU|X1|ACETAMINOPHEN||N||
162|ENG||||||A102|||D1|MTHSPL|SU|X2|ACETAMINOPHEN||N||
163|ENG||||||A103|||D2|MTHSPL|SU|X3|IBUPROFEN||N||
161|ENG||||||A100||||RXNORM|IN|161|acetaminophen||N||
164|ENG||||||||||RXNORM|IN|164|unnamed||N||
";

    #[test]
    fn indexes_atoms_and_source_scoped_atoms() {
        let index = ConceptIndex::from_reader(Cursor::new(CONSO), "conso").unwrap();
        assert_eq!(index.atom_count(), 4);
        assert_eq!(index.descriptor_count(), 4);
        assert_eq!(index.concept_of_atom("A101"), Some("161"));
        assert_eq!(index.concepts_of_descriptor("MTHSPL", "A101"), ["161"]);
        assert_eq!(index.concepts_of_descriptor("MTHSPL", "A103"), ["163"]);
        assert_eq!(index.concepts_of_descriptor("RXNORM", "A100"), ["161"]);
        // The SDUI column is not a key.
        assert!(index.concepts_of_descriptor("MTHSPL", "D1").is_empty());
        assert!(index.concepts_of_descriptor("RXNORM", "A101").is_empty());
    }

    #[test]
    fn one_atom_two_concepts_is_fatal() {
        let mut index = ConceptIndex::new();
        index.insert_atom("1", "A1").unwrap();
        index.insert_atom("1", "A1").unwrap();
        let err = index.insert_atom("2", "A1").unwrap_err();
        assert!(matches!(
            err,
            RxnormError::DuplicateAtomMapping { ref first, ref second, .. } if first == "1" && second == "2"
        ));
    }

    #[test]
    fn duplicate_atom_in_file_reports_through_from_reader() {
        let conso = "1|ENG||||||A1||||RXNORM|IN|1|x||N||\n2|ENG||||||A1||||RXNORM|IN|2|y||N||\n";
        assert!(matches!(
            ConceptIndex::from_reader(Cursor::new(conso), "conso"),
            Err(RxnormError::DuplicateAtomMapping { .. })
        ));
    }

    #[test]
    fn descriptors_are_scoped_by_source() {
        let mut index = ConceptIndex::new();
        index.insert_descriptor("7", "GS", "A7");
        index.insert_descriptor("8", "MMSL", "A7");
        index.insert_descriptor("7", "GS", "A7");
        assert_eq!(index.concepts_of_descriptor("GS", "A7"), ["7"]);
        assert_eq!(index.concepts_of_descriptor("MMSL", "A7"), ["8"]);
    }
}
