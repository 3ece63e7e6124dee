//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::store::{StoreError, StoreResult};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> StoreResult<Self> {
        info!("Connecting to MongoDB");

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await?;

        let mongo = Self {
            client,
            db_name: db_name.to_string(),
        };
        mongo.ping().await?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(mongo)
    }

    /// Round-trip a ping command
    pub async fn ping(&self) -> StoreResult<()> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> StoreResult<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> StoreResult<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> StoreResult<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner.create_indexes(indices).await?;

        Ok(())
    }

    /// Insert a document and return its ObjectId
    pub async fn insert_one(&self, item: T) -> StoreResult<ObjectId> {
        let result = self.inner.insert_one(item).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Bson("inserted id is not an ObjectId".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> StoreResult<Option<T>> {
        Ok(self.inner.find_one(filter).await?)
    }

    /// Find many documents by filter.
    /// Documents that fail to decode are logged and skipped.
    pub async fn find_many(&self, filter: Document) -> StoreResult<Vec<T>> {
        use futures_util::StreamExt;

        let cursor = self.inner.find(filter).await?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> StoreResult<UpdateResult> {
        Ok(self.inner.update_one(filter, update.into()).await?)
    }

    /// Hard delete one document; returns whether anything was removed
    pub async fn delete_one(&self, filter: Document) -> StoreResult<bool> {
        let result = self.inner.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
