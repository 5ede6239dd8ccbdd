//! Single-call CRUD operations against a named collection.
//!
//! Each function issues exactly one driver operation and maps the outcome
//! into a small summary type or a classified [`StoreError`].

use mongodb::{
    Cursor, Database,
    bson::{self, Bson, Document, doc},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{Result, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct InsertAck {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteSummary {
    pub deleted: u64,
}

/// Filter matching records whose `field` equals `value` exactly.
pub fn eq_filter(field: &str, value: impl Into<Bson>) -> Document {
    let mut filter = Document::new();
    filter.insert(field, value.into());
    filter
}

/// Wraps a serializable partial record in a `$set` update document.
pub fn set_document<C: Serialize>(collection: &str, changes: &C) -> Result<Document> {
    let fields = bson::to_document(changes)?;
    if fields.is_empty() {
        return Err(StoreError::EmptyUpdate(collection.to_string()));
    }

    Ok(doc! { "$set": fields })
}

pub async fn insert_one<T>(db: &Database, collection: &str, record: &T) -> Result<InsertAck>
where
    T: Serialize + Send + Sync,
{
    let result = db
        .collection::<T>(collection)
        .insert_one(record)
        .await
        .map_err(|e| StoreError::from_driver("insert", collection, e))?;

    tracing::info!(collection, inserted_id = %result.inserted_id, "inserted record");

    Ok(InsertAck {
        inserted_id: result.inserted_id,
    })
}

pub async fn find<T>(db: &Database, collection: &str, filter: Document) -> Result<RecordCursor<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    tracing::debug!(collection, %filter, "find");

    let cursor = db
        .collection::<T>(collection)
        .find(filter)
        .await
        .map_err(|e| StoreError::from_driver("find", collection, e))?;

    Ok(RecordCursor {
        inner: cursor,
        collection: collection.to_string(),
    })
}

pub async fn update_one(
    db: &Database,
    collection: &str,
    filter: Document,
    update: Document,
) -> Result<UpdateSummary> {
    tracing::debug!(collection, %filter, %update, "update one");

    let result = db
        .collection::<Document>(collection)
        .update_one(filter, update)
        .await
        .map_err(|e| StoreError::from_driver("update", collection, e))?;

    let summary = UpdateSummary {
        matched: result.matched_count,
        modified: result.modified_count,
    };
    tracing::info!(
        collection,
        matched = summary.matched,
        modified = summary.modified,
        "updated record"
    );

    Ok(summary)
}

/// `$set`s the serialized `changes` on the first record matching `filter`.
pub async fn set_fields<C: Serialize>(
    db: &Database,
    collection: &str,
    filter: Document,
    changes: &C,
) -> Result<UpdateSummary> {
    let update = set_document(collection, changes)?;
    update_one(db, collection, filter, update).await
}

pub async fn delete_one(db: &Database, collection: &str, filter: Document) -> Result<DeleteSummary> {
    tracing::debug!(collection, %filter, "delete one");

    let result = db
        .collection::<Document>(collection)
        .delete_one(filter)
        .await
        .map_err(|e| StoreError::from_driver("delete", collection, e))?;

    tracing::info!(collection, deleted = result.deleted_count, "deleted record");

    Ok(DeleteSummary {
        deleted: result.deleted_count,
    })
}

pub async fn delete_many(
    db: &Database,
    collection: &str,
    filter: Document,
) -> Result<DeleteSummary> {
    tracing::debug!(collection, %filter, "delete many");

    let result = db
        .collection::<Document>(collection)
        .delete_many(filter)
        .await
        .map_err(|e| StoreError::from_driver("delete", collection, e))?;

    if result.deleted_count > 0 {
        tracing::info!(collection, deleted = result.deleted_count, "deleted records");
    } else {
        tracing::info!(collection, "no records matched");
    }

    Ok(DeleteSummary {
        deleted: result.deleted_count,
    })
}

/// Single-pass reader over the results of [`find`].
///
/// The server-side cursor is released by [`close`](Self::close) or when the
/// reader is dropped.
pub struct RecordCursor<T> {
    inner: Cursor<T>,
    collection: String,
}

impl<T> RecordCursor<T>
where
    T: DeserializeOwned + Send + Sync,
{
    /// Next decoded record, or `None` once the results are exhausted.
    /// A record that fails to decode ends iteration with an error.
    pub async fn try_next(&mut self) -> Result<Option<T>> {
        let has_next = self
            .inner
            .advance()
            .await
            .map_err(|e| StoreError::from_driver("find", &self.collection, e))?;
        if !has_next {
            return Ok(None);
        }

        self.inner
            .deserialize_current()
            .map(Some)
            .map_err(|source| StoreError::Decode {
                collection: self.collection.clone(),
                source,
            })
    }

    /// Drains the remaining records, then closes the cursor.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut records = Vec::new();
        while let Some(record) = self.try_next().await? {
            records.push(record);
        }
        self.close();

        Ok(records)
    }

    pub fn close(self) {
        tracing::debug!(collection = %self.collection, "closing cursor");
        drop(self.inner);
    }
}
