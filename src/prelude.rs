pub use crate::config::{OutputFormat, Overrides, RunnerOptions};
pub use crate::error::{Error, Result};
pub use crate::memory::MemorySource;
pub use crate::mongo::MongoSource;
pub use crate::pipeline::TempCount;
pub use crate::report::Report;
pub use crate::runner::{required_bound, QueryRunner, RunSummary, Step};
pub use crate::source::{DocumentIter, DocumentSource};
