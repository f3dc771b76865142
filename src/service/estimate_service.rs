use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::config::WorkflowConfig;
use crate::dto::estimate_dto::{ConversionOutcome, QuotationSubmission, SubmitEstimateRequest};
use crate::dto::parse_id;
use crate::dto::response_dto::Paginated;
use crate::model::category::Category;
use crate::model::estimate::{
    CustomerProgress, CustomerResponse, CustomerResponseStatus, Estimate, EstimateStatus, FreelancerQuotation,
    MobileNumber, NewEstimate, SupervisorProgress,
};
use crate::model::estimate_change::{EstimateChange, EstimateGuard};
use crate::model::lead::Customer;
use crate::model::mortgage::ConversionBundle;
use crate::model::quotation::Quotation;
use crate::model::user::{Actor, Role};
use crate::repository::estimate_repo::EstimateFilter;
use crate::repository::stores::WorkflowStores;
use crate::service::pricing::{price_items, QuotationDraft};
use crate::service::transition::{self, Transition};
use crate::util::error::ServiceError;
use crate::util::mobile;
use crate::util::notifier::{self, Notification, Notifier, WorkflowEvent};

#[async_trait]
pub trait EstimateService: Send + Sync {
    /// Lead intake. `actor` is the caller when the request carried a token.
    async fn submit_estimate(&self, request: SubmitEstimateRequest, actor: Option<Actor>) -> Result<Estimate, ServiceError>;
    async fn get_estimate(&self, id: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError>;
    async fn list_estimates(
        &self,
        filter: EstimateFilter,
        page: Option<u32>,
        limit: Option<u32>,
        actor: &Actor,
    ) -> Result<Paginated<Estimate>, ServiceError>;

    async fn assign_supervisor(&self, id: ObjectId, supervisor: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError>;
    async fn send_to_freelancers(&self, id: ObjectId, freelancers: Vec<ObjectId>, actor: &Actor) -> Result<Estimate, ServiceError>;
    async fn submit_quotation(&self, id: ObjectId, draft: QuotationDraft, actor: &Actor) -> Result<QuotationSubmission, ServiceError>;
    async fn create_final_quotation(&self, id: ObjectId, draft: QuotationDraft, actor: &Actor) -> Result<QuotationSubmission, ServiceError>;
    async fn approve_final_quotation(&self, id: ObjectId, actor: &Actor) -> Result<QuotationSubmission, ServiceError>;
    async fn customer_response(
        &self,
        id: ObjectId,
        status: CustomerResponseStatus,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Estimate, ServiceError>;
    async fn convert_to_deal(&self, id: ObjectId, actor: &Actor) -> Result<ConversionOutcome, ServiceError>;
    async fn cancel(&self, id: ObjectId, reason: Option<String>, actor: &Actor) -> Result<Estimate, ServiceError>;
    async fn delete_estimate(&self, id: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError>;
}

pub struct EstimateServiceImpl {
    pub stores: WorkflowStores,
    pub notifier: Arc<dyn Notifier>,
    pub config: WorkflowConfig,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EstimateServiceImpl {
    pub fn new(stores: WorkflowStores, notifier: Arc<dyn Notifier>, config: WorkflowConfig) -> Self {
        EstimateServiceImpl { stores, notifier, config }
    }

    fn notify(&self, estimate: &Estimate, event: WorkflowEvent) {
        notifier::dispatch(self.notifier.clone(), Notification::for_estimate(estimate, event));
    }

    async fn load(&self, id: ObjectId) -> Result<Estimate, ServiceError> {
        self.stores
            .estimates
            .get_by_id(id, false)
            .await
            .map_err(ServiceError::from)
    }

    /// Runs one compare-and-swap. A guard that no longer matches means another
    /// writer changed the estimate after it was read.
    async fn apply(&self, id: ObjectId, guard: &EstimateGuard, change: EstimateChange) -> Result<Estimate, ServiceError> {
        match self.stores.estimates.compare_and_swap(id, guard, &change).await? {
            Some(updated) => Ok(updated),
            None => {
                warn!(estimate_id = %id, change = change.name(), "Lost compare-and-swap");
                Err(ServiceError::ConcurrentModification(format!(
                    "estimate {} changed before {} could be applied",
                    id,
                    change.name()
                )))
            }
        }
    }

    /// Whether some approval of the estimate went through, judged by the
    /// customer cycle having started.
    async fn approval_landed(&self, id: ObjectId) -> bool {
        match self.stores.estimates.get_by_id(id, true).await {
            Ok(current) => current.customer_progress != CustomerProgress::NotStarted,
            Err(e) => {
                error!("Failed to re-read estimate after lost approval: {}", e);
                true
            }
        }
    }

    async fn release_approval(&self, quotation: ObjectId, at: DateTime<Utc>) {
        match self.stores.quotations.clear_approval(quotation, at).await {
            Ok(Some(_)) => info!(quotation_id = %quotation, "Approval stamp released"),
            Ok(None) => warn!(quotation_id = %quotation, "Approval stamp already gone"),
            Err(e) => error!(quotation_id = %quotation, "Failed to release approval stamp: {}", e),
        }
    }

    /// Removes a quotation whose estimate write did not go through.
    async fn discard_orphan(&self, quotation: &Quotation) {
        if let Err(e) = self.stores.quotations.delete(quotation.id).await {
            error!(quotation_id = %quotation.id, "Failed to delete orphan quotation: {}", e);
        }
    }

    /// Checks the user exists, is active and holds `role`.
    async fn require_user(&self, id: &ObjectId, role: Role, field: &str) -> Result<(), ServiceError> {
        match self.stores.users.find_by_id(id).await? {
            Some(user) if user.role == role && user.active => Ok(()),
            Some(_) => Err(ServiceError::Validation(format!("{}: user {} is not an active {}", field, id, role))),
            None => Err(ServiceError::NotFound(format!("{}: user {} not found", field, id))),
        }
    }

    /// Finds the downstream customer by email, then by mobile, creating one
    /// when neither matches.
    async fn resolve_customer(&self, name: &str, email: &str, mobile: &MobileNumber) -> Result<Customer, ServiceError> {
        if let Some(customer) = self.stores.customers.find_by_email(email).await? {
            return Ok(customer);
        }
        if let Some(customer) = self.stores.customers.find_by_mobile(mobile).await? {
            return Ok(customer);
        }
        let customer = Customer::new(name.to_string(), email.to_string(), mobile.clone(), Utc::now());
        info!(customer_id = %customer.id, "Creating customer");
        Ok(self.stores.customers.create(customer).await?)
    }

    async fn validate_category(&self, category: &ObjectId, subcategories: &[ObjectId]) -> Result<Category, ServiceError> {
        let category = match self.stores.catalog.get_category(category).await? {
            Some(c) if c.active => c,
            _ => {
                return Err(ServiceError::Validation(format!("category: {} does not exist or is inactive", category)));
            }
        };
        for id in subcategories {
            match self.stores.catalog.get_subcategory(id).await? {
                Some(sub) if sub.category == category.id && sub.active => {}
                Some(_) => {
                    return Err(ServiceError::Validation(format!(
                        "subcategories: {} does not belong to category {}",
                        id, category.id
                    )));
                }
                None => {
                    return Err(ServiceError::Validation(format!("subcategories: {} does not exist", id)));
                }
            }
        }
        Ok(category)
    }
}

#[async_trait]
impl EstimateService for EstimateServiceImpl {
    #[instrument(skip(self, request, actor), fields(email = %request.customer_email))]
    async fn submit_estimate(&self, request: SubmitEstimateRequest, actor: Option<Actor>) -> Result<Estimate, ServiceError> {
        info!("Submitting new estimate");
        request.validate()?;

        let category = parse_id("category", &request.category)?;
        let mut subcategories = Vec::with_capacity(request.subcategories.len());
        for raw in &request.subcategories {
            let id = parse_id("subcategories", raw)?;
            if !subcategories.contains(&id) {
                subcategories.push(id);
            }
        }
        let category = self.validate_category(&category, &subcategories).await?;

        let customer_mobile = mobile::normalize(&request.customer_mobile, &self.config.default_country_code)
            .map_err(|e| ServiceError::Validation(format!("customer_mobile: {}", e)))?;
        let customer_name = request.customer_name.trim().to_string();
        let customer_email = request.customer_email.trim().to_lowercase();

        let customer = match actor {
            Some(Actor { id, role: Role::Customer }) => id,
            _ => {
                self.resolve_customer(&customer_name, &customer_email, &customer_mobile)
                    .await?
                    .id
            }
        };

        let estimate = Estimate::pending(
            NewEstimate {
                customer,
                customer_name,
                customer_email,
                customer_mobile,
                category: category.id,
                subcategories,
                description: request.description.trim().to_string(),
                attachments: request.attachments,
                lead_type: category.kind.lead_type(),
            },
            Utc::now(),
        );
        let estimate = self.stores.estimates.create(estimate).await?;
        info!(estimate_id = %estimate.id, "Estimate submitted");
        self.notify(&estimate, WorkflowEvent::EstimateReceived);
        Ok(estimate)
    }

    #[instrument(skip(self, actor), fields(id = %id, actor = %actor.id))]
    async fn get_estimate(&self, id: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError> {
        let estimate = self.load(id).await?;
        if !estimate.is_visible_to(actor) {
            return Err(ServiceError::Forbidden(format!("estimate {} is not visible to {}", id, actor.role)));
        }
        Ok(estimate)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id, role = %actor.role))]
    async fn list_estimates(
        &self,
        mut filter: EstimateFilter,
        page: Option<u32>,
        limit: Option<u32>,
        actor: &Actor,
    ) -> Result<Paginated<Estimate>, ServiceError> {
        match actor.role {
            Role::Superadmin | Role::Admin => {}
            Role::Supervisor => {
                filter.supervisor = Some(actor.id);
                filter.include_deleted = false;
            }
            Role::Freelancer => {
                filter.freelancer = Some(actor.id);
                filter.include_deleted = false;
            }
            Role::Customer => {
                filter.customer = Some(actor.id);
                filter.include_deleted = false;
            }
        }
        let (page, limit) = self.config.page_bounds(page, limit);
        let (items, total) = self.stores.estimates.list(&filter, page, limit).await?;
        info!("Listed {} of {} estimates", items.len(), total);
        Ok(Paginated::new(items, total, page, limit))
    }

    #[instrument(skip(self, actor), fields(id = %id, supervisor = %supervisor))]
    async fn assign_supervisor(&self, id: ObjectId, supervisor: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError> {
        let estimate = self.load(id).await?;
        let change = EstimateChange::AssignSupervisor {
            supervisor,
            assigned_by: actor.id,
            at: Utc::now(),
        };
        let (guard, change) = transition::plan(&estimate, Transition::AssignSupervisor, actor, change)?;
        self.require_user(&supervisor, Role::Supervisor, "supervisor_id").await?;

        let updated = self.apply(id, &guard, change).await?;
        info!("Supervisor assigned");
        self.notify(&updated, WorkflowEvent::SupervisorAssigned { supervisor });
        Ok(updated)
    }

    #[instrument(skip(self, freelancers, actor), fields(id = %id, count = freelancers.len()))]
    async fn send_to_freelancers(&self, id: ObjectId, freelancers: Vec<ObjectId>, actor: &Actor) -> Result<Estimate, ServiceError> {
        let mut unique: Vec<ObjectId> = Vec::with_capacity(freelancers.len());
        for freelancer in freelancers {
            if !unique.contains(&freelancer) {
                unique.push(freelancer);
            }
        }
        if unique.is_empty() {
            return Err(ServiceError::Validation("freelancer_ids: at least one freelancer is required".to_string()));
        }

        let estimate = self.load(id).await?;
        let guard = transition::check(&estimate, Transition::DispatchToFreelancers, actor)?;
        for freelancer in &unique {
            self.require_user(freelancer, Role::Freelancer, "freelancer_ids").await?;
        }

        let change = EstimateChange::DispatchToFreelancers {
            freelancers: unique.clone(),
        };
        let updated = self.apply(id, &guard, change).await?;
        info!("Estimate sent to {} freelancers", unique.len());
        self.notify(&updated, WorkflowEvent::SentToFreelancers { freelancers: unique });
        Ok(updated)
    }

    #[instrument(skip(self, draft, actor), fields(id = %id, freelancer = %actor.id))]
    async fn submit_quotation(&self, id: ObjectId, draft: QuotationDraft, actor: &Actor) -> Result<QuotationSubmission, ServiceError> {
        let estimate = self.load(id).await?;
        let guard = transition::check(&estimate, Transition::SubmitQuotation, actor)?;

        let scope = draft.scope_of_work.trim().to_string();
        if scope.is_empty() {
            return Err(ServiceError::Validation("scope_of_work: is required".to_string()));
        }
        let priced = price_items(&draft.items, draft.discount_percent)?;
        let now = Utc::now();
        let quotation = Quotation::from_freelancer(id, actor.id, scope, priced, now);

        let quotation = self.stores.quotations.create(quotation).await.map_err(|e| {
            if e.is_already_exists() {
                ServiceError::DuplicateSubmission(format!("freelancer {} already quoted estimate {}", actor.id, id))
            } else {
                ServiceError::from(e)
            }
        })?;

        let entry = FreelancerQuotation {
            freelancer: actor.id,
            quotation: quotation.id,
            submitted_at: now,
        };
        let mut updated = match self.apply(id, &guard, EstimateChange::RecordFreelancerQuotation { entry }).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_orphan(&quotation).await;
                return Err(e);
            }
        };
        info!(quotation_id = %quotation.id, grand_total = quotation.grand_total, "Freelancer quotation recorded");
        self.notify(
            &updated,
            WorkflowEvent::QuotationSubmitted {
                freelancer: actor.id,
                quotation: quotation.id,
            },
        );

        if updated.collection_complete() {
            let collect_guard = EstimateGuard::status(EstimateStatus::Assigned)
                .with_supervisor_progress(SupervisorProgress::RequestSent);
            match self
                .stores
                .estimates
                .compare_and_swap(id, &collect_guard, &EstimateChange::CompleteCollection)
                .await?
            {
                Some(completed) => {
                    info!("All dispatched freelancers have responded");
                    self.notify(&completed, WorkflowEvent::QuotationsCollected);
                    updated = completed;
                }
                None => warn!("Estimate moved on before collection could be marked complete"),
            }
        }

        Ok(QuotationSubmission {
            estimate: updated,
            quotation,
        })
    }

    #[instrument(skip(self, draft, actor), fields(id = %id, supervisor = %actor.id))]
    async fn create_final_quotation(&self, id: ObjectId, draft: QuotationDraft, actor: &Actor) -> Result<QuotationSubmission, ServiceError> {
        let estimate = self.load(id).await?;
        let guard = transition::check(&estimate, Transition::CreateFinalQuotation, actor)?;

        let scope = draft.scope_of_work.trim().to_string();
        if scope.is_empty() {
            return Err(ServiceError::Validation("scope_of_work: is required".to_string()));
        }
        let priced = price_items(&draft.items, draft.discount_percent)?;
        let quotation = Quotation::final_from_supervisor(id, actor.id, scope, priced, Utc::now());

        let quotation = self.stores.quotations.create(quotation).await.map_err(|e| {
            if e.is_already_exists() {
                ServiceError::Conflict(format!("estimate {} already has a final quotation", id))
            } else {
                ServiceError::from(e)
            }
        })?;

        let change = EstimateChange::AttachFinalQuotation { quotation: quotation.id };
        let updated = match self.apply(id, &guard, change).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_orphan(&quotation).await;
                return Err(e);
            }
        };
        info!(quotation_id = %quotation.id, grand_total = quotation.grand_total, "Final quotation created");
        self.notify(&updated, WorkflowEvent::FinalQuotationCreated { quotation: quotation.id });
        Ok(QuotationSubmission {
            estimate: updated,
            quotation,
        })
    }

    #[instrument(skip(self, actor), fields(id = %id))]
    async fn approve_final_quotation(&self, id: ObjectId, actor: &Actor) -> Result<QuotationSubmission, ServiceError> {
        let estimate = self.load(id).await?;
        let guard = transition::check(&estimate, Transition::ApproveFinalQuotation, actor)?;
        let quotation_id = estimate.final_quotation.ok_or_else(|| {
            ServiceError::InternalError(format!("estimate {} is final_created without a final quotation", id))
        })?;

        // The stamp is idempotent so a retry after a lost estimate write succeeds.
        let now = Utc::now();
        let (quotation, stamped) = match self.stores.quotations.mark_approved(quotation_id, now).await? {
            Some(quotation) => (quotation, true),
            None => (self.stores.quotations.get_by_id(quotation_id).await?, false),
        };

        let updated = match self.apply(id, &guard, EstimateChange::ApproveFinalQuotation).await {
            Ok(updated) => updated,
            Err(e) => {
                // Only the call that wrote the stamp takes it back, and only
                // when no approval of the estimate landed
                if stamped && !self.approval_landed(id).await {
                    self.release_approval(quotation_id, now).await;
                }
                return Err(e);
            }
        };
        info!(quotation_id = %quotation_id, "Final quotation approved and sent to customer");
        self.notify(
            &updated,
            WorkflowEvent::SentToCustomer {
                quotation: quotation_id,
                grand_total: quotation.grand_total,
            },
        );
        Ok(QuotationSubmission {
            estimate: updated,
            quotation,
        })
    }

    #[instrument(skip(self, reason, actor), fields(id = %id, status = ?status))]
    async fn customer_response(
        &self,
        id: ObjectId,
        status: CustomerResponseStatus,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Estimate, ServiceError> {
        let estimate = self.load(id).await?;
        let reason = trimmed(reason);
        let change = EstimateChange::RecordCustomerResponse {
            response: CustomerResponse {
                status: Some(status),
                reason: reason.clone(),
                responded_at: Some(Utc::now()),
            },
            status: status.resulting_status(),
        };
        let (guard, change) = transition::plan(&estimate, Transition::CustomerResponse(status), actor, change)?;
        let updated = self.apply(id, &guard, change).await?;
        info!(status = %updated.status, "Customer responded");
        self.notify(&updated, WorkflowEvent::CustomerResponded { status, reason });
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(id = %id, actor = %actor.id))]
    async fn convert_to_deal(&self, id: ObjectId, actor: &Actor) -> Result<ConversionOutcome, ServiceError> {
        let estimate = self.load(id).await?;
        let guard = transition::check(&estimate, Transition::ConvertToDeal, actor)?;

        let customer = self
            .resolve_customer(&estimate.customer_name, &estimate.customer_email, &estimate.customer_mobile)
            .await?;
        let now = Utc::now();
        let window = Duration::days(self.config.duplicate_lead_window_days);
        if let Some(lead) = self.stores.conversions.latest_open_lead(&customer.id).await? {
            if lead.estimate == id {
                return Err(ServiceError::AlreadyConverted(id.to_hex()));
            }
            if now.signed_duration_since(lead.created_at) < window {
                warn!(lead_id = %lead.lead_id, "Customer already has an open lead inside the window");
                return Err(ServiceError::DuplicateLeadWindow(format!(
                    "customer {} already has open lead {} from the last {} days",
                    customer.id, lead.lead_id, self.config.duplicate_lead_window_days
                )));
            }
        }

        let (quotation, amount) = match estimate.final_quotation {
            Some(quotation_id) => {
                let quotation = self.stores.quotations.get_by_id(quotation_id).await?;
                (Some(quotation_id), quotation.grand_total)
            }
            None => (None, 0.0),
        };

        // Claim first: only the caller whose compare-and-swap lands creates records.
        let claim = EstimateChange::ConvertToDeal { by: actor.id, at: now };
        let claimed = match self.stores.estimates.compare_and_swap(id, &guard, &claim).await? {
            Some(claimed) => claimed,
            None => {
                let current = self.stores.estimates.get_by_id(id, true).await?;
                return Err(if current.deal_converted_at.is_some() {
                    ServiceError::AlreadyConverted(id.to_hex())
                } else {
                    ServiceError::ConcurrentModification(format!("estimate {} changed during conversion", id))
                });
            }
        };

        let bundle = ConversionBundle::for_estimate(&claimed, &customer, quotation, amount, now);
        // The store re-checks the window atomically with the insert.
        let records = match self.stores.conversions.create_bundle(bundle, now - window).await {
            Ok(records) => records,
            Err(e) => {
                error!("Deal records not created, releasing claim: {}", e);
                let release = EstimateGuard::status(EstimateStatus::Deal);
                match self
                    .stores
                    .estimates
                    .compare_and_swap(id, &release, &EstimateChange::RevertConversion)
                    .await
                {
                    Ok(Some(_)) => info!("Conversion claim released"),
                    Ok(None) => error!("Conversion claim could not be released, estimate changed"),
                    Err(revert) => error!("Failed to release conversion claim: {}", revert),
                }
                if e.is_conflict() {
                    warn!("Customer gained an open lead inside the window during conversion");
                    return Err(ServiceError::DuplicateLeadWindow(e.to_string()));
                }
                return Err(ServiceError::DependencyFailure(format!("failed to create deal records: {}", e)));
            }
        };

        info!(lead_id = %records.lead.lead_id, mortgage = records.mortgage.is_some(), "Estimate converted to deal");
        self.notify(
            &claimed,
            WorkflowEvent::DealCreated {
                lead_id: records.lead.lead_id.clone(),
                application_id: records.mortgage.as_ref().map(|m| m.application.application_id.clone()),
            },
        );
        Ok(ConversionOutcome {
            estimate: claimed,
            records,
        })
    }

    #[instrument(skip(self, reason, actor), fields(id = %id, actor = %actor.id))]
    async fn cancel(&self, id: ObjectId, reason: Option<String>, actor: &Actor) -> Result<Estimate, ServiceError> {
        let estimate = self.load(id).await?;
        let reason = trimmed(reason);
        let change = EstimateChange::Cancel {
            by: actor.id,
            at: Utc::now(),
            reason: reason.clone(),
        };
        let (guard, change) = transition::plan(&estimate, Transition::Cancel, actor, change)?;
        let updated = self.apply(id, &guard, change).await?;
        info!(from = %estimate.status, "Estimate cancelled");
        self.notify(&updated, WorkflowEvent::Cancelled { reason });
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(id = %id, actor = %actor.id))]
    async fn delete_estimate(&self, id: ObjectId, actor: &Actor) -> Result<Estimate, ServiceError> {
        if actor.role != Role::Superadmin {
            return Err(ServiceError::Forbidden(format!("role {} cannot delete estimates", actor.role)));
        }
        let estimate = self.load(id).await?;
        let guard = EstimateGuard::status(estimate.status);
        let updated = self.apply(id, &guard, EstimateChange::SoftDelete { at: Utc::now() }).await?;
        info!("Estimate soft deleted");
        Ok(updated)
    }
}
