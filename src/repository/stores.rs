use std::sync::Arc;

use crate::config::mongo_conf::MongoConfig;
use crate::repository::catalog_repo::{CategoryCatalog, MongoCategoryCatalog};
use crate::repository::customer_repo::{CustomerRepository, MongoCustomerRepository};
use crate::repository::estimate_repo::{EstimateRepository, MongoEstimateRepository};
use crate::repository::lead_repo::{ConversionStore, MongoConversionStore};
use crate::repository::memory::InMemoryStore;
use crate::repository::mongo;
use crate::repository::quotation_repo::{MongoQuotationRepository, QuotationRepository};
use crate::repository::user_repo::{MongoUserDirectory, UserDirectory};

/// Every storage collaborator the workflow services need.
#[derive(Clone)]
pub struct WorkflowStores {
    pub estimates: Arc<dyn EstimateRepository>,
    pub quotations: Arc<dyn QuotationRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub conversions: Arc<dyn ConversionStore>,
    pub catalog: Arc<dyn CategoryCatalog>,
    pub users: Arc<dyn UserDirectory>,
}

impl WorkflowStores {
    pub fn in_memory(store: InMemoryStore) -> Self {
        WorkflowStores {
            estimates: Arc::new(store.clone()),
            quotations: Arc::new(store.clone()),
            customers: Arc::new(store.clone()),
            conversions: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
            users: Arc::new(store),
        }
    }

    /// Connects once and builds every Mongo repository on the shared client,
    /// creating indexes as it goes.
    pub async fn mongo(config: &MongoConfig) -> Result<Self, mongodb::error::Error> {
        let (client, db) = mongo::connect(config).await?;
        let names = &config.collections;
        Ok(WorkflowStores {
            estimates: Arc::new(MongoEstimateRepository::new(&db, &names.estimates).await?),
            quotations: Arc::new(MongoQuotationRepository::new(&db, &names.quotations).await?),
            customers: Arc::new(MongoCustomerRepository::new(&db, &names.customers).await?),
            conversions: Arc::new(MongoConversionStore::new(client, &db, names).await?),
            catalog: Arc::new(MongoCategoryCatalog::new(&db, &names.categories, &names.subcategories)),
            users: Arc::new(MongoUserDirectory::new(&db, &names.users)),
        })
    }
}
