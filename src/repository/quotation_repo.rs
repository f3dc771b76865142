use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::{debug, error, info, warn};

use crate::model::quotation::{Quotation, QuotationRole};
use crate::repository::mongo::page_window;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotationFilter {
    pub estimate: Option<ObjectId>,
    pub author: Option<ObjectId>,
    pub role: Option<QuotationRole>,
    pub is_final: Option<bool>,
}

impl QuotationFilter {
    pub fn matches(&self, quotation: &Quotation) -> bool {
        self.estimate.map_or(true, |id| quotation.estimate == id)
            && self.author.map_or(true, |id| quotation.created_by.id() == id)
            && self.role.map_or(true, |role| quotation.role == role)
            && self.is_final.map_or(true, |is_final| quotation.is_final == is_final)
    }

    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(estimate) = self.estimate {
            filter.insert("estimate", estimate);
        }
        if let Some(author) = self.author {
            filter.insert("created_by.id", author);
        }
        if let Some(role) = self.role {
            filter.insert("role", role.as_str());
        }
        if let Some(is_final) = self.is_final {
            filter.insert("is_final", is_final);
        }
        filter
    }
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the freelancer already quoted this
    /// estimate or the estimate already has a final quotation.
    async fn create(&self, quotation: Quotation) -> RepositoryResult<Quotation>;
    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quotation>;
    async fn delete(&self, id: ObjectId) -> RepositoryResult<()>;
    /// Stamps the approval once. `Ok(None)` when the quotation is missing or
    /// already approved.
    async fn mark_approved(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>>;
    /// Undoes the stamp written by `mark_approved(id, at)`. A stamp with any
    /// other timestamp is left alone.
    async fn clear_approval(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>>;
    async fn list(&self, filter: &QuotationFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Quotation>, u64)>;
}

pub struct MongoQuotationRepository {
    collection: Collection<Quotation>,
}

impl MongoQuotationRepository {
    pub async fn new(db: &Database, collection_name: &str) -> Result<Self, mongodb::error::Error> {
        let collection = db.collection::<Quotation>(collection_name);
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "estimate": 1, "created_by.id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("one_quotation_per_freelancer".to_string())
                        .unique(true)
                        .partial_filter_expression(doc! { "role": QuotationRole::Freelancer.as_str() })
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "estimate": 1 })
                .options(
                    IndexOptions::builder()
                        .name("one_final_quotation".to_string())
                        .unique(true)
                        .partial_filter_expression(doc! { "is_final": true })
                        .build(),
                )
                .build(),
        ];
        collection.create_indexes(indexes, None).await?;
        debug!("Quotation indexes ensured on {}", collection_name);
        Ok(MongoQuotationRepository { collection })
    }
}

#[async_trait]
impl QuotationRepository for MongoQuotationRepository {
    #[tracing::instrument(skip(self, quotation), fields(quotation_id = %quotation.id, estimate = %quotation.estimate))]
    async fn create(&self, quotation: Quotation) -> RepositoryResult<Quotation> {
        info!(role = quotation.role.as_str(), "Creating quotation");
        match self.collection.insert_one(&quotation, None).await {
            Ok(_) => Ok(quotation),
            Err(e) => {
                let err = RepositoryError::from(e);
                if err.is_already_exists() {
                    warn!("Quotation rejected by unique index");
                } else {
                    error!("Failed to create quotation: {}", err);
                }
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quotation> {
        match self.collection.find_one(doc! { "_id": id }, None).await {
            Ok(Some(quotation)) => Ok(quotation),
            Ok(None) => Err(RepositoryError::not_found(format!("Quotation not found for ID: {}", id))),
            Err(e) => {
                error!("Failed to fetch quotation by ID: {}", e);
                Err(RepositoryError::database(format!("Failed to fetch quotation by ID: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: ObjectId) -> RepositoryResult<()> {
        match self.collection.delete_one(doc! { "_id": id }, None).await {
            Ok(result) if result.deleted_count > 0 => {
                info!("Quotation deleted");
                Ok(())
            }
            Ok(_) => Err(RepositoryError::not_found(format!("No quotation found to delete for ID: {}", id))),
            Err(e) => {
                error!("Failed to delete quotation: {}", e);
                Err(RepositoryError::database(format!("Failed to delete quotation: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn mark_approved(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>> {
        let filter = doc! { "_id": id, "superadmin_approved": false };
        let update = doc! {
            "$set": {
                "superadmin_approved": true,
                "superadmin_approved_at": bson::to_bson(&at)?,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(filter, update, options)
            .await
            .map_err(|e| {
                error!("Failed to approve quotation: {}", e);
                RepositoryError::from(e)
            })
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn clear_approval(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>> {
        let filter = doc! {
            "_id": id,
            "superadmin_approved": true,
            "superadmin_approved_at": bson::to_bson(&at)?,
        };
        let update = doc! {
            "$set": { "superadmin_approved": false, "superadmin_approved_at": bson::Bson::Null },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.collection
            .find_one_and_update(filter, update, options)
            .await
            .map_err(|e| {
                error!("Failed to clear quotation approval: {}", e);
                RepositoryError::from(e)
            })
    }

    #[tracing::instrument(skip(self), fields(page = page, limit = limit))]
    async fn list(&self, filter: &QuotationFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Quotation>, u64)> {
        let query = filter.to_document();
        let (skip, limit) = page_window(page, limit);
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(limit)
            .build();

        let total = self
            .collection
            .count_documents(query.clone(), None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to count quotations: {}", e)))?;
        let cursor = self
            .collection
            .find(query, options)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to list quotations: {}", e)))?;
        let quotations: Vec<Quotation> = cursor
            .try_collect()
            .await
            .map_err(|e| RepositoryError::serialization(format!("Failed to deserialize quotation: {}", e)))?;
        info!("Fetched {} of {} quotations", quotations.len(), total);
        Ok((quotations, total))
    }
}
