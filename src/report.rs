//! Writes query results in the selected [`OutputFormat`].

use std::io::Write;

use mongodb::bson::{Bson, Document};

use crate::buffer::documents_frame;
use crate::config::{OutputFormat, DEFAULT_INFER_SCHEMA_LENGTH};
use crate::error::Result;
use crate::pipeline::TempCount;
use crate::source::DocumentIter;

pub struct Report<W: Write> {
    out: W,
    format: OutputFormat,
    infer_schema_length: usize,
}

impl<W: Write> Report<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Report {
            out,
            format,
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }

    pub fn with_infer_schema_length(mut self, infer_schema_length: usize) -> Self {
        self.infer_schema_length = infer_schema_length;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn header(&mut self, title: &str) -> Result<()> {
        writeln!(self.out, "# {title}")?;
        Ok(())
    }

    pub fn sample(&mut self, sample: Option<Document>) -> Result<()> {
        match sample {
            None => writeln!(self.out, "null")?,
            Some(doc) if self.format == OutputFormat::Table => self.table(&[doc])?,
            Some(doc) => self.document(doc)?,
        }
        Ok(())
    }

    pub fn count(&mut self, count: u64) -> Result<()> {
        writeln!(self.out, "count: {count}")?;
        Ok(())
    }

    /// Prints every document of `docs` and returns how many there were.
    ///
    /// Table output has to see all rows before it can print, the other formats stream.
    pub fn documents(&mut self, docs: DocumentIter<'_>) -> Result<u64> {
        if self.format == OutputFormat::Table {
            let docs = docs.collect::<Result<Vec<_>>>()?;
            self.table(&docs)?;
            return Ok(docs.len() as u64);
        }
        let mut printed = 0;
        for doc in docs {
            self.document(doc?)?;
            printed += 1;
        }
        Ok(printed)
    }

    /// Prints aggregation rows as `{ _id, count }` documents, or as a
    /// two-column table named after the grouped field.
    pub fn temp_counts(&mut self, counts: &[TempCount], field: &str) -> Result<()> {
        match self.format {
            OutputFormat::Table => {
                let rows: Vec<Document> = counts
                    .iter()
                    .map(|c| {
                        let mut row = Document::new();
                        row.insert(field, c.key.clone());
                        row.insert("count", c.count);
                        row
                    })
                    .collect();
                self.table(&rows)?;
            }
            OutputFormat::Pretty => {
                for count in counts {
                    let json = Bson::Document(count.to_document()).into_relaxed_extjson();
                    writeln!(self.out, "{}", serde_json::to_string(&json)?)?;
                }
            }
            OutputFormat::Compact => {
                for count in counts {
                    writeln!(self.out, "{}", count.to_document())?;
                }
            }
        }
        Ok(())
    }

    fn document(&mut self, doc: Document) -> Result<()> {
        match self.format {
            OutputFormat::Compact => writeln!(self.out, "{doc}")?,
            _ => {
                let json = Bson::Document(doc).into_relaxed_extjson();
                writeln!(self.out, "{}", serde_json::to_string_pretty(&json)?)?;
            }
        }
        Ok(())
    }

    fn table(&mut self, docs: &[Document]) -> Result<()> {
        let df = documents_frame(docs, self.infer_schema_length)?;
        writeln!(self.out, "{df}")?;
        Ok(())
    }
}
