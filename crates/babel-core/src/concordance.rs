//! Concordance files: `subject\tpredicate\tobject`, one triple per line.

use crate::error::{BabelError, Result};
use crate::metadata::{for_each_row, open};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConcordanceTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl ConcordanceTriple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The equivalence group this triple asserts.
    pub fn pair(&self) -> [&str; 2] {
        [self.subject.as_str(), self.object.as_str()]
    }
}

pub fn read_concordances<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<ConcordanceTriple>> {
    let mut out = Vec::new();
    for_each_row(reader, |line, fields| {
        if fields.len() < 3 {
            return Err(BabelError::malformed(
                source_name,
                line,
                format!("expected 3 tab-separated fields, found {}", fields.len()),
            ));
        }
        out.push(ConcordanceTriple::new(fields[0].trim(), fields[1].trim(), fields[2].trim()));
        Ok(())
    })?;
    Ok(out)
}

pub fn read_concordance_file(path: &Path) -> Result<Vec<ConcordanceTriple>> {
    read_concordances(open(path)?, &path.display().to_string())
}

pub fn write_concordances<'a, W, I>(mut writer: W, triples: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ConcordanceTriple>,
{
    let mut n = 0;
    for t in triples {
        writeln!(writer, "{}\t{}\t{}", t.subject, t.predicate, t.object)?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_tab_separated_triples() {
        let text = "RXCUI:4\thas_tradename\tRXCUI:5\n\nRXCUI:6\thas_form\tRXCUI:7\n";
        let triples = read_concordances(Cursor::new(text), "concord").unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].pair(), ["RXCUI:4", "RXCUI:5"]);
        assert_eq!(triples[1].predicate, "has_form");
    }

    #[test]
    fn short_rows_are_rejected_with_line_number() {
        let err = read_concordances(Cursor::new("A:1\tp\tB:1\nA:2\tB:2\n"), "concord").unwrap_err();
        assert!(matches!(err, BabelError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn write_then_read_matches() {
        let triples = vec![ConcordanceTriple::new("CHEBI:1", "skos:exactMatch", "UNII:X")];
        let mut buf = Vec::new();
        assert_eq!(write_concordances(&mut buf, &triples).unwrap(), 1);
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "CHEBI:1\tskos:exactMatch\tUNII:X\n");
        assert_eq!(read_concordances(Cursor::new(buf), "buf").unwrap(), triples);
    }
}
