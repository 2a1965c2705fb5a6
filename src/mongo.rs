use mongodb::{
    bson::{doc, DateTime, Document},
    options::{AggregateOptions, ClientOptions, FindOptions},
    sync::{Client, Collection},
};
use tracing::debug;

use crate::config::RunnerOptions;
use crate::error::{Error, Result};
use crate::pipeline::{temp_counts_pipeline, TempCount};
use crate::source::{DocumentIter, DocumentSource, TIMESTAMP_FIELD};

/// A collection on a live mongodb server, queried through the blocking driver.
pub struct MongoSource {
    db: String,
    collection_name: String,
    collection: Collection<Document>,
    pub batch_size: Option<u32>,
}

impl MongoSource {
    pub fn with_batch_size(mut self, batch_size: Option<u32>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Opens a client and pings the database, so an unreachable server fails here
    /// rather than on the first query.
    pub fn connect(connection_str: &str, db: &str, collection: &str) -> Result<Self> {
        let mut client_options =
            ClientOptions::parse(connection_str).map_err(|e| Error::Connection(e.to_string()))?;
        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client =
            Client::with_options(client_options).map_err(|e| Error::Connection(e.to_string()))?;
        let database = client.database(db);
        database
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| Error::Connection(e.to_string()))?;
        debug!(db, collection, "connected");

        Ok(MongoSource {
            db: db.to_string(),
            collection_name: collection.to_string(),
            collection: database.collection::<Document>(collection),
            batch_size: None,
        })
    }

    pub fn from_options(options: &RunnerOptions) -> Result<Self> {
        Ok(Self::connect(&options.uri, &options.database, &options.collection)?
            .with_batch_size(options.batch_size))
    }

    fn find(&self, filter: Option<Document>, sort: Option<Document>) -> Result<DocumentIter<'_>> {
        let mut find_options = FindOptions::default();
        find_options.batch_size = self.batch_size;
        find_options.sort = sort;

        let cursor = self
            .collection
            .find(filter, Some(find_options))
            .map_err(Error::query)?;
        Ok(Box::new(cursor.map(|doc| doc.map_err(Error::query))))
    }
}

impl DocumentSource for MongoSource {
    fn fetch_sample(&self) -> Result<Option<Document>> {
        self.collection.find_one(None, None).map_err(Error::query)
    }

    fn count(&self) -> Result<u64> {
        self.collection.count_documents(None, None).map_err(Error::query)
    }

    fn scan_all(&self) -> Result<DocumentIter<'_>> {
        self.find(None, None)
    }

    fn scan_range(&self, before: DateTime) -> Result<DocumentIter<'_>> {
        let mut filter = Document::new();
        filter.insert(TIMESTAMP_FIELD, doc! { "$lt": before });
        let mut sort = Document::new();
        sort.insert(TIMESTAMP_FIELD, 1);
        debug!(%filter, %sort, "range scan");
        self.find(Some(filter), Some(sort))
    }

    fn aggregate_temp_counts(&self, field: &str) -> Result<Vec<TempCount>> {
        let mut aggregate_options = AggregateOptions::default();
        aggregate_options.batch_size = self.batch_size;

        let cursor = self
            .collection
            .aggregate(temp_counts_pipeline(field), Some(aggregate_options))
            .map_err(Error::query)?;
        cursor
            .map(|row| row.map_err(Error::query).and_then(|row| TempCount::from_document(&row)))
            .collect()
    }

    fn describe(&self) -> String {
        format!("mongodb {}.{}", self.db, self.collection_name)
    }
}
