use async_trait::async_trait;
use bson::oid::ObjectId;
use tracing::{info, instrument};

use crate::config::WorkflowConfig;
use crate::dto::response_dto::Paginated;
use crate::model::quotation::Quotation;
use crate::model::user::{Actor, Role};
use crate::repository::quotation_repo::QuotationFilter;
use crate::repository::stores::WorkflowStores;
use crate::util::error::ServiceError;

#[async_trait]
pub trait QuotationService: Send + Sync {
    async fn get_quotation(&self, id: ObjectId, actor: &Actor) -> Result<Quotation, ServiceError>;
    async fn list_quotations(
        &self,
        filter: QuotationFilter,
        page: Option<u32>,
        limit: Option<u32>,
        actor: &Actor,
    ) -> Result<Paginated<Quotation>, ServiceError>;
}

pub struct QuotationServiceImpl {
    pub stores: WorkflowStores,
    pub config: WorkflowConfig,
}

impl QuotationServiceImpl {
    pub fn new(stores: WorkflowStores, config: WorkflowConfig) -> Self {
        QuotationServiceImpl { stores, config }
    }
}

#[async_trait]
impl QuotationService for QuotationServiceImpl {
    /// Staff read any quotation and freelancers read their own. A customer
    /// only ever sees the approved final quotation of an estimate they own.
    #[instrument(skip(self, actor), fields(id = %id, role = %actor.role))]
    async fn get_quotation(&self, id: ObjectId, actor: &Actor) -> Result<Quotation, ServiceError> {
        let quotation = self.stores.quotations.get_by_id(id).await?;
        let visible = match actor.role {
            Role::Superadmin | Role::Admin | Role::Supervisor => true,
            Role::Freelancer => quotation.created_by.id() == actor.id,
            Role::Customer => {
                quotation.is_final
                    && quotation.superadmin_approved
                    && self
                        .stores
                        .estimates
                        .get_by_id(quotation.estimate, false)
                        .await?
                        .customer
                        == actor.id
            }
        };
        if !visible {
            return Err(ServiceError::Forbidden(format!("quotation {} is not visible to {}", id, actor.role)));
        }
        Ok(quotation)
    }

    #[instrument(skip(self, actor), fields(role = %actor.role))]
    async fn list_quotations(
        &self,
        mut filter: QuotationFilter,
        page: Option<u32>,
        limit: Option<u32>,
        actor: &Actor,
    ) -> Result<Paginated<Quotation>, ServiceError> {
        match actor.role {
            Role::Superadmin | Role::Admin | Role::Supervisor => {}
            Role::Freelancer => filter.author = Some(actor.id),
            Role::Customer => {
                return Err(ServiceError::Forbidden("customers cannot list quotations".to_string()));
            }
        }
        let (page, limit) = self.config.page_bounds(page, limit);
        let (items, total) = self.stores.quotations.list(&filter, page, limit).await?;
        info!("Listed {} of {} quotations", items.len(), total);
        Ok(Paginated::new(items, total, page, limit))
    }
}
