//! RRF row model.
//!
//! RRF files are `|`-delimited with a trailing `|`. Only the columns used
//! here are named.
//!
//! RXNCONSO: `RXCUI|LAT|TS|LUI|STT|SUI|ISPREF|RXAUI|SAUI|SCUI|SDUI|SAB|...`
//!
//! RXNREL:   `RXCUI1|RXAUI1|STYPE1|REL|RXCUI2|RXAUI2|STYPE2|RELA|RUI|SRUI|SAB|...`
//!
//! RXNREL reads right to left: `RXCUI2 RELA RXCUI1`, so the `*2` columns
//! are the subject and the `*1` columns the object.

use crate::error::{Result, RxnormError};

const CONSO_MIN_FIELDS: usize = 12;
const REL_MIN_FIELDS: usize = 11;

/// How one side of a relationship row names its concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptRef<'a> {
    /// `CUI`: the concept id itself.
    Concept(&'a str),
    /// `AUI`: an atom, owned by exactly one concept.
    Atom(&'a str),
    /// `SDUI`: a source-asserted atom, looked up as `(SAB, RXAUI)` and
    /// possibly covering several concepts.
    SourceDescriptor { sab: &'a str, aui: &'a str },
}

impl<'a> ConceptRef<'a> {
    pub fn parse(mode: &str, cui: &'a str, aui: &'a str, sab: &'a str, line: usize) -> Result<Self> {
        match mode {
            "CUI" => Ok(ConceptRef::Concept(cui)),
            "AUI" => Ok(ConceptRef::Atom(aui)),
            "SDUI" => Ok(ConceptRef::SourceDescriptor { sab, aui }),
            other => Err(RxnormError::UnknownAddressingMode {
                mode: other.to_string(),
                line,
            }),
        }
    }
}

/// The RXNCONSO columns needed to build the concept indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoRow<'a> {
    pub cui: &'a str,
    pub aui: &'a str,
    pub sab: &'a str,
}

impl<'a> ConsoRow<'a> {
    pub fn parse(line: &'a str, line_no: usize, source_name: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < CONSO_MIN_FIELDS {
            return Err(RxnormError::malformed(
                source_name,
                line_no,
                format!("expected at least {CONSO_MIN_FIELDS} fields, found {}", fields.len()),
            ));
        }
        Ok(Self {
            cui: fields[0],
            aui: fields[7],
            sab: fields[11],
        })
    }
}

/// One RXNREL row. Addressing modes are parsed on demand so rows with
/// uninteresting predicates never fail on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelRow<'a> {
    pub line: usize,
    pub predicate: &'a str,
    pub sab: &'a str,
    subject: (&'a str, &'a str, &'a str),
    object: (&'a str, &'a str, &'a str),
}

impl<'a> RelRow<'a> {
    pub fn parse(line: &'a str, line_no: usize, source_name: &str) -> Result<Self> {
        let f: Vec<&str> = line.split('|').collect();
        if f.len() < REL_MIN_FIELDS {
            return Err(RxnormError::malformed(
                source_name,
                line_no,
                format!("expected at least {REL_MIN_FIELDS} fields, found {}", f.len()),
            ));
        }
        Ok(Self {
            line: line_no,
            predicate: f[7],
            sab: f[10],
            subject: (f[6], f[4], f[5]),
            object: (f[2], f[0], f[1]),
        })
    }

    pub fn subject(&self) -> Result<ConceptRef<'a>> {
        let (mode, cui, aui) = self.subject;
        ConceptRef::parse(mode, cui, aui, self.sab, self.line)
    }

    pub fn object(&self) -> Result<ConceptRef<'a>> {
        let (mode, cui, aui) = self.object;
        ConceptRef::parse(mode, cui, aui, self.sab, self.line)
    }
}
