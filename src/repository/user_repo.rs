use crate::model::user::User;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use bson::oid::ObjectId;
use mongodb::{Collection, Database};

/// Read-only view of the identity directory, used to check who is a
/// supervisor or a freelancer before work is routed to them.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &ObjectId) -> RepositoryResult<Option<User>>;
}

pub struct MongoUserDirectory {
    collection: Collection<User>,
}

impl MongoUserDirectory {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        MongoUserDirectory {
            collection: db.collection::<User>(collection_name),
        }
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn find_by_id(&self, id: &ObjectId) -> RepositoryResult<Option<User>> {
        let filter = bson::doc! { "_id": id };
        let user = self
            .collection
            .find_one(filter, None)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to find user by id: {}", e)))?;
        Ok(user)
    }
}
