use mongodb::bson::{DateTime, Document};

use crate::error::Result;
use crate::pipeline::TempCount;

/// Field the range scan filters and sorts on.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Lazy sequence of documents. A fresh call restarts from the beginning.
pub type DocumentIter<'a> = Box<dyn Iterator<Item = Result<Document>> + 'a>;

/// Read-only access to one collection.
pub trait DocumentSource {
    /// One arbitrary document, `None` when the collection is empty.
    fn fetch_sample(&self) -> Result<Option<Document>>;

    /// Exact number of documents in the collection.
    fn count(&self) -> Result<u64>;

    fn scan_all(&self) -> Result<DocumentIter<'_>>;

    /// Documents with `timestamp < before`, ascending by `timestamp`.
    fn scan_range(&self, before: DateTime) -> Result<DocumentIter<'_>>;

    /// Unwind `field`, count rows per value, sort by count then value, both descending.
    fn aggregate_temp_counts(&self, field: &str) -> Result<Vec<TempCount>>;

    /// Human-readable location of the collection, for log lines.
    fn describe(&self) -> String;
}
