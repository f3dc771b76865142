//! In-process implementations of every repository trait.
//!
//! One mutex guards all collections, so each trait method is atomic with
//! respect to the others, the same way a single MongoDB document update is.
//! The store backs the test suite and local runs without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

use crate::model::category::{Category, Subcategory};
use crate::model::estimate::{Estimate, MobileNumber};
use crate::model::estimate_change::{EstimateChange, EstimateGuard};
use crate::model::lead::{Customer, PropertyLead};
use crate::model::mortgage::{ConversionBundle, MortgageApplication};
use crate::model::quotation::{Quotation, QuotationRole};
use crate::model::user::User;
use crate::repository::catalog_repo::CategoryCatalog;
use crate::repository::customer_repo::CustomerRepository;
use crate::repository::estimate_repo::{EstimateFilter, EstimateRepository};
use crate::repository::lead_repo::ConversionStore;
use crate::repository::quotation_repo::{QuotationFilter, QuotationRepository};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::user_repo::UserDirectory;

#[derive(Default)]
struct Collections {
    estimates: HashMap<ObjectId, Estimate>,
    quotations: HashMap<ObjectId, Quotation>,
    customers: HashMap<ObjectId, Customer>,
    leads: HashMap<ObjectId, PropertyLead>,
    applications: HashMap<ObjectId, MortgageApplication>,
    documents: usize,
    basic_details: usize,
    categories: HashMap<ObjectId, Category>,
    subcategories: HashMap<ObjectId, Subcategory>,
    users: HashMap<ObjectId, User>,
    fail_conversions: bool,
}

#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Collections>> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::database("in-memory store lock poisoned"))
    }

    fn with<T>(&self, f: impl FnOnce(&mut Collections) -> T) -> RepositoryResult<T> {
        let mut guard = self.lock()?;
        Ok(f(&mut *guard))
    }

    pub fn insert_user(&self, user: User) -> RepositoryResult<()> {
        self.with(|c| {
            c.users.insert(user.id, user);
        })
    }

    pub fn insert_category(&self, category: Category) -> RepositoryResult<()> {
        self.with(|c| {
            c.categories.insert(category.id, category);
        })
    }

    pub fn insert_subcategory(&self, subcategory: Subcategory) -> RepositoryResult<()> {
        self.with(|c| {
            c.subcategories.insert(subcategory.id, subcategory);
        })
    }

    pub fn insert_lead(&self, lead: PropertyLead) -> RepositoryResult<()> {
        self.with(|c| {
            c.leads.insert(lead.id, lead);
        })
    }

    /// Makes every following `create_bundle` call fail with a database error.
    pub fn set_conversion_failure(&self, fail: bool) -> RepositoryResult<()> {
        self.with(|c| c.fail_conversions = fail)
    }

    pub fn leads_for_estimate(&self, estimate: &ObjectId) -> RepositoryResult<Vec<PropertyLead>> {
        self.with(|c| {
            c.leads
                .values()
                .filter(|lead| &lead.estimate == estimate)
                .cloned()
                .collect()
        })
    }

    pub fn applications_for_estimate(&self, estimate: &ObjectId) -> RepositoryResult<Vec<MortgageApplication>> {
        self.with(|c| {
            c.applications
                .values()
                .filter(|app| &app.estimate == estimate)
                .cloned()
                .collect()
        })
    }

    /// `(leads, applications, documents, basic_details)` currently stored.
    pub fn conversion_counts(&self) -> RepositoryResult<(usize, usize, usize, usize)> {
        self.with(|c| (c.leads.len(), c.applications.len(), c.documents, c.basic_details))
    }

    pub fn customer_count(&self) -> RepositoryResult<usize> {
        self.with(|c| c.customers.len())
    }
}

fn paginate<T>(mut items: Vec<T>, page: u32, limit: u32, created_at: impl Fn(&T) -> DateTime<Utc>) -> (Vec<T>, u64) {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    let total = items.len() as u64;
    let skip = (page.max(1) as usize - 1) * limit as usize;
    let page = items.into_iter().skip(skip).take(limit as usize).collect();
    (page, total)
}

#[async_trait]
impl EstimateRepository for InMemoryStore {
    async fn create(&self, estimate: Estimate) -> RepositoryResult<Estimate> {
        self.with(|c| {
            if c.estimates.contains_key(&estimate.id) {
                return Err(RepositoryError::already_exists(format!("Estimate {} already exists", estimate.id)));
            }
            c.estimates.insert(estimate.id, estimate.clone());
            Ok(estimate)
        })?
    }

    async fn get_by_id(&self, id: ObjectId, include_deleted: bool) -> RepositoryResult<Estimate> {
        self.with(|c| {
            c.estimates
                .get(&id)
                .filter(|e| include_deleted || !e.is_deleted())
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(format!("Estimate not found for ID: {}", id)))
        })?
    }

    async fn compare_and_swap(
        &self,
        id: ObjectId,
        guard: &EstimateGuard,
        change: &EstimateChange,
    ) -> RepositoryResult<Option<Estimate>> {
        self.with(|c| match c.estimates.get_mut(&id) {
            Some(estimate) if guard.matches(estimate) => {
                change.apply(estimate, Utc::now());
                Some(estimate.clone())
            }
            _ => None,
        })
    }

    async fn list(&self, filter: &EstimateFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Estimate>, u64)> {
        self.with(|c| {
            let matching = c.estimates.values().filter(|e| filter.matches(e)).cloned().collect();
            paginate(matching, page, limit, |e: &Estimate| e.created_at)
        })
    }
}

#[async_trait]
impl QuotationRepository for InMemoryStore {
    async fn create(&self, quotation: Quotation) -> RepositoryResult<Quotation> {
        self.with(|c| {
            let clash = c.quotations.values().any(|existing| {
                existing.estimate == quotation.estimate
                    && ((quotation.role == QuotationRole::Freelancer
                        && existing.role == QuotationRole::Freelancer
                        && existing.created_by.id() == quotation.created_by.id())
                        || (quotation.is_final && existing.is_final))
            });
            if clash {
                return Err(RepositoryError::already_exists(format!(
                    "Duplicate key: quotation for estimate {}",
                    quotation.estimate
                )));
            }
            c.quotations.insert(quotation.id, quotation.clone());
            Ok(quotation)
        })?
    }

    async fn get_by_id(&self, id: ObjectId) -> RepositoryResult<Quotation> {
        self.with(|c| {
            c.quotations
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(format!("Quotation not found for ID: {}", id)))
        })?
    }

    async fn delete(&self, id: ObjectId) -> RepositoryResult<()> {
        self.with(|c| {
            c.quotations
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| RepositoryError::not_found(format!("No quotation found to delete for ID: {}", id)))
        })?
    }

    async fn mark_approved(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>> {
        self.with(|c| match c.quotations.get_mut(&id) {
            Some(quotation) if !quotation.superadmin_approved => {
                quotation.superadmin_approved = true;
                quotation.superadmin_approved_at = Some(at);
                Some(quotation.clone())
            }
            _ => None,
        })
    }

    async fn clear_approval(&self, id: ObjectId, at: DateTime<Utc>) -> RepositoryResult<Option<Quotation>> {
        self.with(|c| match c.quotations.get_mut(&id) {
            Some(quotation) if quotation.superadmin_approved && quotation.superadmin_approved_at == Some(at) => {
                quotation.superadmin_approved = false;
                quotation.superadmin_approved_at = None;
                Some(quotation.clone())
            }
            _ => None,
        })
    }

    async fn list(&self, filter: &QuotationFilter, page: u32, limit: u32) -> RepositoryResult<(Vec<Quotation>, u64)> {
        self.with(|c| {
            let matching = c.quotations.values().filter(|q| filter.matches(q)).cloned().collect();
            paginate(matching, page, limit, |q: &Quotation| q.created_at)
        })
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>> {
        let email = email.to_lowercase();
        self.with(|c| c.customers.values().find(|customer| customer.email == email).cloned())
    }

    async fn find_by_mobile(&self, mobile: &MobileNumber) -> RepositoryResult<Option<Customer>> {
        self.with(|c| c.customers.values().find(|customer| &customer.mobile == mobile).cloned())
    }

    async fn create(&self, customer: Customer) -> RepositoryResult<Customer> {
        self.with(|c| {
            c.customers.insert(customer.id, customer.clone());
            customer
        })
    }
}

#[async_trait]
impl ConversionStore for InMemoryStore {
    async fn latest_open_lead(&self, customer: &ObjectId) -> RepositoryResult<Option<PropertyLead>> {
        self.with(|c| {
            c.leads
                .values()
                .filter(|lead| &lead.customer == customer && lead.status.is_open())
                .max_by_key(|lead| lead.created_at)
                .cloned()
        })
    }

    async fn create_bundle(
        &self,
        bundle: ConversionBundle,
        open_lead_cutoff: DateTime<Utc>,
    ) -> RepositoryResult<ConversionBundle> {
        self.with(|c| {
            if c.fail_conversions {
                return Err(RepositoryError::database("conversion store unavailable"));
            }
            if c.leads.values().any(|lead| lead.estimate == bundle.lead.estimate) {
                return Err(RepositoryError::already_exists(format!(
                    "Duplicate key: lead for estimate {}",
                    bundle.lead.estimate
                )));
            }
            let recent = c.leads.values().find(|lead| {
                lead.customer == bundle.lead.customer && lead.status.is_open() && lead.created_at > open_lead_cutoff
            });
            if let Some(lead) = recent {
                return Err(RepositoryError::conflict(format!(
                    "customer {} already has open lead {}",
                    lead.customer, lead.lead_id
                )));
            }
            c.leads.insert(bundle.lead.id, bundle.lead.clone());
            if let Some(ref mortgage) = bundle.mortgage {
                c.applications.insert(mortgage.application.id, mortgage.application.clone());
                c.documents += 1;
                c.basic_details += 1;
            }
            Ok(bundle)
        })?
    }
}

#[async_trait]
impl CategoryCatalog for InMemoryStore {
    async fn get_category(&self, id: &ObjectId) -> RepositoryResult<Option<Category>> {
        self.with(|c| c.categories.get(id).cloned())
    }

    async fn get_subcategory(&self, id: &ObjectId) -> RepositoryResult<Option<Subcategory>> {
        self.with(|c| c.subcategories.get(id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_id(&self, id: &ObjectId) -> RepositoryResult<Option<User>> {
        self.with(|c| c.users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::estimate::EstimateStatus;
    use crate::model::quotation::PricedItems;

    fn priced() -> PricedItems {
        PricedItems {
            items: vec![],
            subtotal: 0.0,
            discount_percent: 0.0,
            discount_amount: 0.0,
            grand_total: 0.0,
        }
    }

    #[tokio::test]
    async fn second_final_quotation_is_rejected() {
        let store = InMemoryStore::new();
        let estimate = ObjectId::new();
        let first = Quotation::final_from_supervisor(estimate, ObjectId::new(), "a".into(), priced(), Utc::now());
        let second = Quotation::final_from_supervisor(estimate, ObjectId::new(), "b".into(), priced(), Utc::now());
        QuotationRepository::create(&store, first).await.unwrap();
        let err = QuotationRepository::create(&store, second).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn approval_stamp_applies_once() {
        let store = InMemoryStore::new();
        let quotation = Quotation::final_from_supervisor(ObjectId::new(), ObjectId::new(), "a".into(), priced(), Utc::now());
        let id = quotation.id;
        QuotationRepository::create(&store, quotation).await.unwrap();
        assert!(store.mark_approved(id, Utc::now()).await.unwrap().is_some());
        assert!(store.mark_approved(id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cas_on_missing_estimate_reports_no_match() {
        let store = InMemoryStore::new();
        let result = store
            .compare_and_swap(
                ObjectId::new(),
                &EstimateGuard::status(EstimateStatus::Pending),
                &EstimateChange::CompleteCollection,
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
