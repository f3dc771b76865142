use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};

use crate::model::category::{Category, Subcategory};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

/// Category lookups against the product catalog, which this crate never writes.
#[async_trait]
pub trait CategoryCatalog: Send + Sync {
    async fn get_category(&self, id: &ObjectId) -> RepositoryResult<Option<Category>>;
    async fn get_subcategory(&self, id: &ObjectId) -> RepositoryResult<Option<Subcategory>>;
}

pub struct MongoCategoryCatalog {
    categories: Collection<Category>,
    subcategories: Collection<Subcategory>,
}

impl MongoCategoryCatalog {
    pub fn new(db: &Database, categories: &str, subcategories: &str) -> Self {
        MongoCategoryCatalog {
            categories: db.collection::<Category>(categories),
            subcategories: db.collection::<Subcategory>(subcategories),
        }
    }
}

#[async_trait]
impl CategoryCatalog for MongoCategoryCatalog {
    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn get_category(&self, id: &ObjectId) -> RepositoryResult<Option<Category>> {
        self.categories
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to fetch category: {}", e)))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn get_subcategory(&self, id: &ObjectId) -> RepositoryResult<Option<Subcategory>> {
        self.subcategories
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to fetch subcategory: {}", e)))
    }
}
