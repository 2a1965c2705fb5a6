#![deny(clippy::all)]
//! Ad-hoc reads, range scans and a fixed temperature aggregation over a
//! mongodb collection of sensor readings.
//!
//! ```no_run
//! use scratch_query::prelude::*;
//!
//! let options = RunnerOptions::default();
//! let source = MongoSource::from_options(&options)?;
//! let runner = QueryRunner::from_options(source, &options)?;
//! let mut report = Report::new(std::io::stdout().lock(), options.format);
//! runner.run(&mut report)?;
//! # Ok::<(), scratch_query::Error>(())
//! ```

mod buffer;
pub mod config;
mod conversion;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod pipeline;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod source;

pub use buffer::documents_frame;
pub use error::{Error, Result};
