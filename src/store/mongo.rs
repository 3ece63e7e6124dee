//! MongoDB document store

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::{DateTime as ChronoDateTime, Utc};
use tracing::warn;

use crate::db::schemas::{details_to_bson, AchievementDoc, AttachmentDoc, ACHIEVEMENT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::model::{AchievementDocument, Attachment, ContentUpdate, NewDocument};
use crate::store::{DocumentStore, StoreError, StoreResult};

/// Achievement documents in the `achievements` collection
#[derive(Clone)]
pub struct MongoDocumentStore {
    client: MongoClient,
    collection: MongoCollection<AchievementDoc>,
}

impl MongoDocumentStore {
    /// Open the collection, applying its indexes
    pub async fn open(client: MongoClient) -> StoreResult<Self> {
        let collection = client
            .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
            .await?;
        Ok(Self { client, collection })
    }

    fn by_id(id: &str) -> StoreResult<Document> {
        let oid = ObjectId::parse_str(id)?;
        Ok(doc! { "_id": oid })
    }

    async fn update_by_id(&self, id: &str, update: Document) -> StoreResult<bool> {
        let result = self.collection.update_one(Self::by_id(id)?, update).await?;
        Ok(result.matched_count > 0)
    }
}

/// `$set` document for the supplied fields of a content update
fn content_set(update: &ContentUpdate, now: ChronoDateTime<Utc>) -> StoreResult<Document> {
    let mut set = doc! { "updated_at": DateTime::from_chrono(now) };
    if let Some(ref t) = update.achievement_type {
        set.insert("achievement_type", t.as_str());
    }
    if let Some(ref t) = update.title {
        set.insert("title", t.as_str());
    }
    if let Some(ref d) = update.description {
        set.insert("description", d.as_str());
    }
    if let Some(ref d) = update.details {
        set.insert("details", details_to_bson(d)?);
    }
    if let Some(ref t) = update.tags {
        set.insert("tags", t.clone());
    }
    Ok(set)
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert(&self, new: NewDocument) -> StoreResult<String> {
        let doc = AchievementDoc::try_from(new)?;
        let oid = self.collection.insert_one(doc).await?;
        Ok(oid.to_hex())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AchievementDocument>> {
        self.collection
            .find_one(Self::by_id(id)?)
            .await?
            .map(AchievementDocument::try_from)
            .transpose()
    }

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<AchievementDocument>> {
        let oids: Vec<ObjectId> = ids
            .iter()
            .filter_map(|id| match ObjectId::parse_str(id) {
                Ok(oid) => Some(oid),
                Err(e) => {
                    warn!(document_id = %id, error = %e, "Skipping malformed document id");
                    None
                }
            })
            .collect();

        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self
            .collection
            .find_many(doc! { "_id": { "$in": oids } })
            .await?;

        docs.into_iter()
            .map(AchievementDocument::try_from)
            .collect::<Result<Vec<_>, StoreError>>()
    }

    async fn update_content(
        &self,
        id: &str,
        update: &ContentUpdate,
        now: ChronoDateTime<Utc>,
    ) -> StoreResult<bool> {
        let set = content_set(update, now)?;
        self.update_by_id(id, doc! { "$set": set }).await
    }

    async fn push_attachment(
        &self,
        id: &str,
        attachment: &Attachment,
        now: ChronoDateTime<Utc>,
    ) -> StoreResult<bool> {
        let attachment = bson::to_bson(&AttachmentDoc::from(attachment))?;
        self.update_by_id(
            id,
            doc! {
                "$push": { "attachments": attachment },
                "$set": { "updated_at": DateTime::from_chrono(now) },
            },
        )
        .await
    }

    async fn set_points(&self, id: &str, points: i32, now: ChronoDateTime<Utc>) -> StoreResult<bool> {
        self.update_by_id(
            id,
            doc! {
                "$set": {
                    "points": points,
                    "updated_at": DateTime::from_chrono(now),
                }
            },
        )
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.collection.delete_one(Self::by_id(id)?).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client.ping().await
    }
}
