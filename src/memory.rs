//! In-process collection, loaded from a `mongoexport` style dump.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use mongodb::bson::{Bson, DateTime, Document};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pipeline::{aggregate_temp_counts_local, TempCount};
use crate::source::{DocumentIter, DocumentSource, TIMESTAMP_FIELD};

/// A collection held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    docs: Vec<Document>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, docs: Vec<Document>) -> Self {
        MemorySource {
            name: name.into(),
            docs,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    /// Reads extended JSON, either one document per line or a single JSON array.
    ///
    /// Array dumps report the element index in place of a line number.
    pub fn from_reader<R: Read>(name: impl Into<String>, mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let docs = if content.trim_start().starts_with('[') {
            let items: Vec<serde_json::Value> = serde_json::from_str(&content)
                .map_err(|e| Error::Dump { line: e.line(), message: e.to_string() })?;
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| to_document(item, idx + 1))
                .collect::<Result<Vec<_>>>()?
        } else {
            let mut docs = Vec::new();
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value: serde_json::Value = serde_json::from_str(line)
                    .map_err(|e| Error::Dump { line: idx + 1, message: e.to_string() })?;
                docs.push(to_document(value, idx + 1)?);
            }
            docs
        };

        let source = MemorySource::new(name, docs);
        debug!(name = %source.name, documents = source.docs.len(), "loaded dump");
        Ok(source)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_reader(name, file)
    }
}

fn to_document(value: serde_json::Value, line: usize) -> Result<Document> {
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(Error::Dump {
            line,
            message: format!("expected a document, found {:?}", other.element_type()),
        }),
        Err(e) => Err(Error::Dump { line, message: e.to_string() }),
    }
}

fn timestamp_millis(doc: &Document) -> Option<i64> {
    match doc.get(TIMESTAMP_FIELD) {
        Some(Bson::DateTime(dt)) => Some(dt.timestamp_millis()),
        _ => None,
    }
}

impl DocumentSource for MemorySource {
    fn fetch_sample(&self) -> Result<Option<Document>> {
        Ok(self.docs.first().cloned())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.docs.len() as u64)
    }

    fn scan_all(&self) -> Result<DocumentIter<'_>> {
        Ok(Box::new(self.docs.iter().cloned().map(Ok)))
    }

    fn scan_range(&self, before: DateTime) -> Result<DocumentIter<'_>> {
        let bound = before.timestamp_millis();
        let mut matched: Vec<(i64, &Document)> = self
            .docs
            .iter()
            .filter_map(|doc| timestamp_millis(doc).map(|ts| (ts, doc)))
            .filter(|(ts, _)| *ts < bound)
            .collect();
        matched.sort_by_key(|(ts, _)| *ts);
        Ok(Box::new(matched.into_iter().map(|(_, doc)| Ok(doc.clone()))))
    }

    fn aggregate_temp_counts(&self, field: &str) -> Result<Vec<TempCount>> {
        Ok(aggregate_temp_counts_local(self.docs.iter().cloned(), field))
    }

    fn describe(&self) -> String {
        format!("dump {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn reads_json_lines_with_extended_dates() {
        let input = r#"{"device":"fec9e916","temp":[21,22],"timestamp":{"$date":"2017-05-24T10:00:00Z"}}

{"device":"fec9e916","temp":23,"timestamp":{"$date":"2017-05-26T10:00:00Z"}}
"#;
        let source = MemorySource::from_reader("scratch_data", input.as_bytes()).unwrap();
        assert_eq!(source.count().unwrap(), 2);
        let first = &source.documents()[0];
        assert!(matches!(first.get(TIMESTAMP_FIELD), Some(Bson::DateTime(_))));
    }

    #[test]
    fn reads_json_array() {
        let input = "  \n[{\"temp\": 1}, {\"temp\": 2}]";
        let source = MemorySource::from_reader("arr", input.as_bytes()).unwrap();
        assert_eq!(source.documents(), &[doc! { "temp": 1 }, doc! { "temp": 2 }]);
    }

    #[test]
    fn empty_input_is_empty_collection() {
        let source = MemorySource::from_reader("empty", "\n\n".as_bytes()).unwrap();
        assert_eq!(source.count().unwrap(), 0);
        assert_eq!(source.fetch_sample().unwrap(), None);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let input = "{\"temp\": 1}\n{\"temp\": \n";
        let err = MemorySource::from_reader("bad", input.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dump { line: 2, .. }));
    }

    #[test]
    fn non_document_line_is_rejected() {
        let err = MemorySource::from_reader("bad", "42\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dump { line: 1, .. }));
    }

    #[test]
    fn range_skips_missing_and_non_date_timestamps() {
        let source = MemorySource::new(
            "scratch_data",
            vec![
                doc! { "timestamp": DateTime::from_millis(30), "n": 1 },
                doc! { "timestamp": "yesterday", "n": 2 },
                doc! { "n": 3 },
                doc! { "timestamp": DateTime::from_millis(10), "n": 4 },
                doc! { "timestamp": DateTime::from_millis(50), "n": 5 },
            ],
        );
        let found: Vec<i32> = source
            .scan_range(DateTime::from_millis(50))
            .unwrap()
            .map(|doc| doc.unwrap().get_i32("n").unwrap())
            .collect();
        assert_eq!(found, vec![4, 1]);
    }
}
