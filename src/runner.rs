//! The exploration workflow: sample, count, full scan, range scan, temperature counts.

use std::io::Write;

use mongodb::bson::DateTime;
use tracing::{debug, info};

use crate::config::RunnerOptions;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::source::DocumentSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Sample,
    Count,
    Scan,
    Range,
    Agg,
}

impl Step {
    pub const ALL: [Step; 5] = [Step::Sample, Step::Count, Step::Scan, Step::Range, Step::Agg];

    pub fn needs_bound(self) -> bool {
        self == Step::Range
    }
}

/// Parses the range bound if `step` uses it; `None` stands for a full run.
pub fn required_bound(options: &RunnerOptions, step: Option<Step>) -> Result<Option<DateTime>> {
    match step {
        Some(step) if !step.needs_bound() => Ok(None),
        _ => options.before_bound().map(Some),
    }
}

/// What a run printed, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sampled: bool,
    pub count: u64,
    pub scanned: u64,
    pub in_range: u64,
    pub groups: usize,
    pub unwound_rows: i64,
}

pub struct QueryRunner<S: DocumentSource> {
    source: S,
    before: Option<DateTime>,
    field: String,
}

impl<S: DocumentSource> QueryRunner<S> {
    pub fn new(source: S, before: DateTime, field: impl Into<String>) -> Self {
        Self::with_bound(source, Some(before), field)
    }

    /// A runner without a bound can run every step except [`Step::Range`].
    pub fn with_bound(source: S, before: Option<DateTime>, field: impl Into<String>) -> Self {
        QueryRunner {
            source,
            before,
            field: field.into(),
        }
    }

    pub fn from_options(source: S, options: &RunnerOptions) -> Result<Self> {
        Ok(Self::new(source, options.before_bound()?, options.field.clone()))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs every step in order, each under its own header.
    pub fn run<W: Write>(&self, report: &mut Report<W>) -> Result<RunSummary> {
        info!(source = %self.source.describe(), "running all queries");
        let mut summary = RunSummary::default();
        for step in Step::ALL {
            report.header(&self.title(step))?;
            self.run_step_into(step, report, &mut summary)?;
        }
        info!(?summary, "done");
        Ok(summary)
    }

    /// Runs a single step without a header.
    pub fn run_step<W: Write>(&self, step: Step, report: &mut Report<W>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.run_step_into(step, report, &mut summary)?;
        Ok(summary)
    }

    fn title(&self, step: Step) -> String {
        match step {
            Step::Sample => "sample".to_string(),
            Step::Count => "count".to_string(),
            Step::Scan => "all documents".to_string(),
            Step::Range => match self.before {
                Some(before) => format!(
                    "documents before {}",
                    before
                        .try_to_rfc3339_string()
                        .unwrap_or_else(|_| before.timestamp_millis().to_string())
                ),
                None => "documents in range".to_string(),
            },
            Step::Agg => format!("{} counts", self.field),
        }
    }

    fn run_step_into<W: Write>(
        &self,
        step: Step,
        report: &mut Report<W>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        match step {
            Step::Sample => {
                let sample = self.source.fetch_sample()?;
                summary.sampled = sample.is_some();
                report.sample(sample)?;
            }
            Step::Count => {
                summary.count = self.source.count()?;
                debug!(count = summary.count);
                report.count(summary.count)?;
            }
            Step::Scan => {
                summary.scanned = report.documents(self.source.scan_all()?)?;
                debug!(scanned = summary.scanned);
            }
            Step::Range => {
                let before = self
                    .before
                    .ok_or_else(|| Error::Config("range scan needs a timestamp bound".into()))?;
                let docs = self.source.scan_range(before)?;
                summary.in_range = report.documents(docs)?;
                debug!(%before, in_range = summary.in_range);
            }
            Step::Agg => {
                let counts = self.source.aggregate_temp_counts(&self.field)?;
                summary.groups = counts.len();
                summary.unwound_rows = counts.iter().map(|c| c.count).sum();
                debug!(field = %self.field, groups = summary.groups, rows = summary.unwound_rows);
                report.temp_counts(&counts, &self.field)?;
            }
        }
        Ok(())
    }
}
