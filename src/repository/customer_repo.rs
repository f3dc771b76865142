use async_trait::async_trait;
use bson::doc;
use mongodb::{options::IndexOptions, Collection, Database, IndexModel};
use tracing::{debug, error, info};

use crate::model::estimate::MobileNumber;
use crate::model::lead::Customer;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>>;
    async fn find_by_mobile(&self, mobile: &MobileNumber) -> RepositoryResult<Option<Customer>>;
    async fn create(&self, customer: Customer) -> RepositoryResult<Customer>;
}

pub struct MongoCustomerRepository {
    collection: Collection<Customer>,
}

impl MongoCustomerRepository {
    pub async fn new(db: &Database, collection_name: &str) -> Result<Self, mongodb::error::Error> {
        let collection = db.collection::<Customer>(collection_name);
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().name("email".to_string()).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "mobile.country_code": 1, "mobile.number": 1 })
                .options(IndexOptions::builder().name("mobile".to_string()).build())
                .build(),
        ];
        collection.create_indexes(indexes, None).await?;
        debug!("Customer indexes ensured on {}", collection_name);
        Ok(MongoCustomerRepository { collection })
    }
}

#[async_trait]
impl CustomerRepository for MongoCustomerRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>> {
        let filter = doc! { "email": email.to_lowercase() };
        self.collection
            .find_one(filter, None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to find customer by email: {}", e)))
    }

    #[tracing::instrument(skip(self), fields(mobile = %mobile))]
    async fn find_by_mobile(&self, mobile: &MobileNumber) -> RepositoryResult<Option<Customer>> {
        let filter = doc! {
            "mobile.country_code": &mobile.country_code,
            "mobile.number": &mobile.number,
        };
        self.collection
            .find_one(filter, None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to find customer by mobile: {}", e)))
    }

    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn create(&self, customer: Customer) -> RepositoryResult<Customer> {
        match self.collection.insert_one(&customer, None).await {
            Ok(_) => {
                info!("Customer created");
                Ok(customer)
            }
            Err(e) => {
                error!("Failed to create customer: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }
}
