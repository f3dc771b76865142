use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use tracing::{debug, error, info, warn};

use crate::model::estimate::{Estimate, EstimateStatus};
use crate::model::estimate_change::{EstimateChange, EstimateGuard};
use crate::repository::mongo::page_window;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

/// Query over stored estimates. Every field narrows the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimateFilter {
    pub status: Option<EstimateStatus>,
    pub supervisor: Option<ObjectId>,
    pub freelancer: Option<ObjectId>,
    pub customer: Option<ObjectId>,
    pub include_deleted: bool,
}

impl EstimateFilter {
    pub fn matches(&self, estimate: &Estimate) -> bool {
        if !self.include_deleted && estimate.is_deleted() {
            return false;
        }
        if let Some(status) = self.status {
            if estimate.status != status {
                return false;
            }
        }
        if let Some(supervisor) = &self.supervisor {
            if !estimate.is_assigned_to(supervisor) {
                return false;
            }
        }
        if let Some(freelancer) = &self.freelancer {
            if !estimate.is_dispatched_to(freelancer) {
                return false;
            }
        }
        if let Some(customer) = &self.customer {
            if &estimate.customer != customer {
                return false;
            }
        }
        true
    }

    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if !self.include_deleted {
            filter.insert("deleted_at", Bson::Null);
        }
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(supervisor) = self.supervisor {
            filter.insert("assigned_supervisor", supervisor);
        }
        if let Some(freelancer) = self.freelancer {
            filter.insert("sent_to_freelancers", freelancer);
        }
        if let Some(customer) = self.customer {
            filter.insert("customer", customer);
        }
        filter
    }
}

#[async_trait]
pub trait EstimateRepository: Send + Sync {
    async fn create(&self, estimate: Estimate) -> RepositoryResult<Estimate>;
    async fn get_by_id(&self, id: ObjectId, include_deleted: bool) -> RepositoryResult<Estimate>;
    /// Applies `change` only if the stored estimate still satisfies `guard`.
    /// `Ok(None)` means the guard no longer held: the estimate is missing or
    /// another writer got there first.
    async fn compare_and_swap(
        &self,
        id: ObjectId,
        guard: &EstimateGuard,
        change: &EstimateChange,
    ) -> RepositoryResult<Option<Estimate>>;
    /// Returns one page, newest first, together with the total match count.
    async fn list(&self, filter: &EstimateFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Estimate>, u64)>;
}

pub struct MongoEstimateRepository {
    collection: Collection<Estimate>,
}

impl MongoEstimateRepository {
    pub async fn new(db: &Database, collection_name: &str) -> Result<Self, mongodb::error::Error> {
        let collection = db.collection::<Estimate>(collection_name);
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "status": 1, "created_at": -1 })
                .options(IndexOptions::builder().name("status_created_at".to_string()).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "assigned_supervisor": 1 })
                .options(IndexOptions::builder().name("assigned_supervisor".to_string()).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "sent_to_freelancers": 1 })
                .options(IndexOptions::builder().name("sent_to_freelancers".to_string()).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "customer": 1 })
                .options(IndexOptions::builder().name("customer".to_string()).build())
                .build(),
        ];
        collection.create_indexes(indexes, None).await?;
        debug!("Estimate indexes ensured on {}", collection_name);
        Ok(MongoEstimateRepository { collection })
    }
}

#[async_trait]
impl EstimateRepository for MongoEstimateRepository {
    #[tracing::instrument(skip(self, estimate), fields(estimate_id = %estimate.id))]
    async fn create(&self, estimate: Estimate) -> RepositoryResult<Estimate> {
        info!("Creating new estimate");
        match self.collection.insert_one(&estimate, None).await {
            Ok(_) => {
                info!("Estimate created successfully");
                Ok(estimate)
            }
            Err(e) => {
                error!("Failed to create estimate: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn get_by_id(&self, id: ObjectId, include_deleted: bool) -> RepositoryResult<Estimate> {
        let mut filter = doc! { "_id": id };
        if !include_deleted {
            filter.insert("deleted_at", Bson::Null);
        }
        match self.collection.find_one(filter, None).await {
            Ok(Some(estimate)) => Ok(estimate),
            Ok(None) => {
                warn!("Estimate not found for ID: {}", id);
                Err(RepositoryError::not_found(format!("Estimate not found for ID: {}", id)))
            }
            Err(e) => {
                error!("Failed to fetch estimate by ID: {}", e);
                Err(RepositoryError::database(format!("Failed to fetch estimate by ID: {}", e)))
            }
        }
    }

    #[tracing::instrument(skip(self, guard, change), fields(id = %id, change = change.name()))]
    async fn compare_and_swap(
        &self,
        id: ObjectId,
        guard: &EstimateGuard,
        change: &EstimateChange,
    ) -> RepositoryResult<Option<Estimate>> {
        let filter = guard.to_filter(id);
        let update = change.to_update(Utc::now())?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        match self.collection.find_one_and_update(filter, update, options).await {
            Ok(Some(estimate)) => {
                info!(status = %estimate.status, "Estimate change applied");
                Ok(Some(estimate))
            }
            Ok(None) => {
                warn!("Estimate guard did not match, change not applied");
                Ok(None)
            }
            Err(e) => {
                error!("Failed to apply estimate change: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(page = page, limit = limit))]
    async fn list(&self, filter: &EstimateFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Estimate>, u64)> {
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
            .map_err(|e| RepositoryError::database(format!("Failed to count estimates: {}", e)))?;
        let cursor = self
            .collection
            .find(query, options)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to list estimates: {}", e)))?;
        let estimates: Vec<Estimate> = cursor.try_collect().await.map_err(|e| {
            error!("Failed to deserialize estimate: {}", e);
            RepositoryError::serialization(format!("Failed to deserialize estimate: {}", e))
        })?;
        info!("Fetched {} of {} estimates", estimates.len(), total);
        Ok((estimates, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_document_excludes_deleted_by_default() {
        let supervisor = ObjectId::new();
        let filter = EstimateFilter {
            status: Some(EstimateStatus::Assigned),
            supervisor: Some(supervisor),
            ..EstimateFilter::default()
        };
        let document = filter.to_document();
        assert_eq!(document.get("deleted_at"), Some(&Bson::Null));
        assert_eq!(document.get_str("status").unwrap(), "assigned");
        assert_eq!(document.get_object_id("assigned_supervisor").unwrap(), supervisor);

        let with_deleted = EstimateFilter {
            include_deleted: true,
            ..EstimateFilter::default()
        };
        assert!(with_deleted.to_document().is_empty());
    }
}
