//! Identifier files and per-node side tables (types, labels, descriptions, IC).
//!
//! All inputs are tab-separated, one record per line, keyed by CURIE:
//!
//! - identifiers:  `CURIE[\ttype]`
//! - labels:       `CURIE\tlabel`
//! - descriptions: `CURIE\tdescription`
//! - IC:           `CURIE\tic`

use crate::curie;
use crate::error::{BabelError, Result};
use ahash::AHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Identifiers read from one identifier file, with their optional types.
#[derive(Debug, Clone, Default)]
pub struct IdentifierFile {
    pub identifiers: Vec<String>,
    pub types: AHashMap<String, String>,
}

pub(crate) fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| BabelError::file(path, e))?;
    Ok(BufReader::new(file))
}

/// Iterate non-blank lines as `(line_number, tab-separated fields)`.
pub(crate) fn for_each_row<R, F>(reader: R, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, Vec<&str>) -> Result<()>,
{
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        f(i + 1, line.split('\t').collect())?;
    }
    Ok(())
}

fn curie_field(source_name: &str, line: usize, raw: &str) -> Result<String> {
    curie::parse(raw).map_err(|_| BabelError::malformed(source_name, line, format!("not a CURIE: {raw:?}")))
}

pub fn read_identifiers<R: BufRead>(reader: R, source_name: &str) -> Result<IdentifierFile> {
    let mut out = IdentifierFile::default();
    for_each_row(reader, |line, fields| {
        let id = curie_field(source_name, line, fields[0])?;
        if let Some(ty) = fields.get(1).map(|t| t.trim()).filter(|t| !t.is_empty()) {
            out.types.insert(id.clone(), ty.to_string());
        }
        out.identifiers.push(id);
        Ok(())
    })?;
    Ok(out)
}

pub fn read_identifier_file(path: &Path) -> Result<IdentifierFile> {
    read_identifiers(open(path)?, &path.display().to_string())
}

/// Side tables consulted by the compendium writer.
#[derive(Debug, Clone, Default)]
pub struct NodeMetadata {
    labels: AHashMap<String, String>,
    descriptions: AHashMap<String, Vec<String>>,
    types: AHashMap<String, String>,
    ic: AHashMap<String, f64>,
}

impl NodeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn descriptions(&self, id: &str) -> &[String] {
        self.descriptions.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn type_of(&self, id: &str) -> Option<&str> {
        self.types.get(id).map(String::as_str)
    }

    pub fn ic(&self, id: &str) -> Option<f64> {
        self.ic.get(id).copied()
    }

    /// First label for an identifier wins.
    pub fn insert_label(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.labels.entry(id.into()).or_insert_with(|| label.into());
    }

    pub fn insert_description(&mut self, id: impl Into<String>, description: impl Into<String>) {
        let descriptions = self.descriptions.entry(id.into()).or_default();
        let description = description.into();
        if !descriptions.contains(&description) {
            descriptions.push(description);
        }
    }

    pub fn insert_type(&mut self, id: impl Into<String>, ty: impl Into<String>) {
        self.types.insert(id.into(), ty.into());
    }

    pub fn insert_ic(&mut self, id: impl Into<String>, ic: f64) {
        self.ic.insert(id.into(), ic);
    }

    pub fn extend_types(&mut self, types: AHashMap<String, String>) {
        self.types.extend(types);
    }

    pub fn load_labels<R: BufRead>(&mut self, reader: R, source_name: &str) -> Result<usize> {
        let mut n = 0;
        for_each_row(reader, |line, fields| {
            let Some(label) = fields.get(1).map(|l| l.trim()).filter(|l| !l.is_empty()) else {
                return Err(BabelError::malformed(source_name, line, "missing label column"));
            };
            self.insert_label(curie_field(source_name, line, fields[0])?, label);
            n += 1;
            Ok(())
        })?;
        Ok(n)
    }

    pub fn load_descriptions<R: BufRead>(&mut self, reader: R, source_name: &str) -> Result<usize> {
        let mut n = 0;
        for_each_row(reader, |line, fields| {
            let Some(desc) = fields.get(1).map(|d| d.trim()).filter(|d| !d.is_empty()) else {
                return Err(BabelError::malformed(source_name, line, "missing description column"));
            };
            self.insert_description(curie_field(source_name, line, fields[0])?, desc);
            n += 1;
            Ok(())
        })?;
        Ok(n)
    }

    pub fn load_ic<R: BufRead>(&mut self, reader: R, source_name: &str) -> Result<usize> {
        let mut n = 0;
        for_each_row(reader, |line, fields| {
            let raw = fields.get(1).map(|v| v.trim()).unwrap_or("");
            let value: f64 = raw
                .parse()
                .map_err(|_| BabelError::malformed(source_name, line, format!("bad IC value {raw:?}")))?;
            self.insert_ic(curie_field(source_name, line, fields[0])?, value);
            n += 1;
            Ok(())
        })?;
        Ok(n)
    }

    pub fn load_label_file(&mut self, path: &Path) -> Result<usize> {
        self.load_labels(open(path)?, &path.display().to_string())
    }

    pub fn load_description_file(&mut self, path: &Path) -> Result<usize> {
        self.load_descriptions(open(path)?, &path.display().to_string())
    }

    pub fn load_ic_file(&mut self, path: &Path) -> Result<usize> {
        self.load_ic(open(path)?, &path.display().to_string())
    }
}
