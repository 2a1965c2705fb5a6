//! Runner configuration: defaults, TOML files and command-line overrides.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime as ChronoDateTime, NaiveDate, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_DATABASE: &str = "ble_bean_stream";
pub const DEFAULT_COLLECTION: &str = "scratch_data";
pub const DEFAULT_BEFORE: &str = "2017-05-25";
pub const DEFAULT_FIELD: &str = "temp";
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 100;

/// How documents and aggregation rows are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented relaxed extended JSON, one document at a time.
    #[default]
    Pretty,
    /// One document per line.
    Compact,
    /// Columnar table built from the documents.
    Table,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Compact => "compact",
            OutputFormat::Table => "table",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "table" => Ok(OutputFormat::Table),
            other => Err(Error::Config(format!("unknown output format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerOptions {
    /// mongodb style connection string. `mongodb://<user>:<password>@host.domain`
    pub uri: String,
    /// the name of the mongodb database
    pub database: String,
    /// the name of the mongodb collection
    pub collection: String,
    /// Exclusive upper bound of the range scan, RFC 3339 or `YYYY-MM-DD`.
    pub before: String,
    /// Field unwound and grouped by the aggregation.
    pub field: String,
    pub format: OutputFormat,
    /// determines the number of records to return from a single request to mongodb
    pub batch_size: Option<u32>,
    /// Number of documents read to infer the table columns.
    pub infer_schema_length: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            before: DEFAULT_BEFORE.to_string(),
            field: DEFAULT_FIELD.to_string(),
            format: OutputFormat::default(),
            batch_size: None,
            infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }
}

impl RunnerOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads options from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Applies command-line and environment overrides on top of these options.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(uri) = overrides.uri {
            self.uri = uri;
        }
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(collection) = overrides.collection {
            self.collection = collection;
        }
        if let Some(before) = overrides.before {
            self.before = before;
        }
        if let Some(field) = overrides.field {
            self.field = field;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if overrides.batch_size.is_some() {
            self.batch_size = overrides.batch_size;
        }
        if let Some(length) = overrides.infer_schema_length {
            self.infer_schema_length = length;
        }
        self
    }

    pub fn before_bound(&self) -> Result<DateTime> {
        parse_bound(&self.before)
    }
}

/// Values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub before: Option<String>,
    pub field: Option<String>,
    pub format: Option<OutputFormat>,
    pub batch_size: Option<u32>,
    pub infer_schema_length: Option<usize>,
}

/// Parses a range bound. A bare date means midnight UTC of that day.
pub fn parse_bound(value: &str) -> Result<DateTime> {
    let value = value.trim();
    if let Ok(dt) = ChronoDateTime::parse_from_rfc3339(value) {
        return Ok(DateTime::from_millis(dt.with_timezone(&Utc).timestamp_millis()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::Config(format!("invalid date '{value}'")))?;
        return Ok(DateTime::from_millis(midnight.and_utc().timestamp_millis()));
    }
    Err(Error::Config(format!(
        "invalid timestamp '{value}', expected RFC 3339 or YYYY-MM-DD"
    )))
}
