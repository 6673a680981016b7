//! Triple store
//!
//! Append-only, insertion-ordered collection of triples with the flat
//! three-column CSV format (`Entity1,Relation,Entity2`).

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::{Result, SkgError, Table, Triple};

/// Column headers of the exported triple file
pub const TRIPLE_COLUMNS: [&str; 3] = ["Entity1", "Relation", "Entity2"];

/// Ordered collection of extracted triples
///
/// No deduplication: identical triples from different sentences are kept
/// as separate records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripleStore {
    triples: Vec<Triple>,
}

impl TripleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one triple
    pub fn push(&mut self, triple: Triple) {
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    /// Distinct subjects and objects in first-seen order
    pub fn entities(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for t in &self.triples {
            for e in [&t.subject, &t.object] {
                if seen.insert(e.as_str()) {
                    entities.push(e.clone());
                }
            }
        }
        entities
    }

    /// Synthesized "subject predicate object" sentences in insertion order
    pub fn sentences(&self) -> Vec<String> {
        self.triples.iter().map(Triple::sentence).collect()
    }

    /// Serialize all triples as CSV to a writer
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        // An empty store still gets its header row.
        if self.triples.is_empty() {
            wtr.write_record(TRIPLE_COLUMNS)?;
        }
        for t in &self.triples {
            wtr.serialize(t)?;
        }
        wtr.flush().map_err(|e| SkgError::Serialization(e.to_string()))?;
        Ok(())
    }

    /// Read triples back from CSV
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut store = Self::new();
        for record in rdr.deserialize() {
            let triple: Triple = record?;
            store.push(triple);
        }
        Ok(store)
    }

    /// Write the triple file, overwriting any previous run
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| SkgError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        self.to_writer(file)?;
        info!(path = %path.display(), triples = self.len(), "wrote triple file");
        Ok(())
    }

    /// Read a previously exported triple file
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| SkgError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    /// Materialize as a display table
    pub fn to_table(&self) -> Table {
        let mut table = Table::new()
            .with_headers(TRIPLE_COLUMNS.iter().map(|c| c.to_string()).collect())
            .with_caption("Extracted Triples");
        for t in &self.triples {
            table.add_row(vec![
                Some(t.subject.clone()),
                Some(t.predicate.clone()),
                Some(t.object.clone()),
            ]);
        }
        table
    }
}

impl Extend<Triple> for TripleStore {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter);
    }
}

impl FromIterator<Triple> for TripleStore {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TripleStore {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
