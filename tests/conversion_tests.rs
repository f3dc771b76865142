mod common;

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};

use common::World;
use estimate_workflow::config::WorkflowConfig;
use estimate_workflow::model::lead::PropertyLead;
use estimate_workflow::model::mortgage::ConversionBundle;
use estimate_workflow::repository::lead_repo::ConversionStore;
use estimate_workflow::repository::memory::InMemoryStore;
use estimate_workflow::repository::repository_error::RepositoryResult;
use estimate_workflow::model::estimate::{CustomerResponseStatus, EstimateStatus, LeadType};
use estimate_workflow::model::user::{Actor, Role};
use estimate_workflow::service::estimate_service::EstimateService;
use estimate_workflow::util::error::ServiceError;
use estimate_workflow::util::mobile::MobileInput;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conversions_create_one_deal() {
    let world = World::new();
    let estimate = world.accepted("race@example.com").await;
    let id = estimate.id;

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = world.service.clone();
        let actor = if n % 2 == 0 { world.admin.clone() } else { world.superadmin.clone() };
        handles.push(tokio::spawn(async move { service.convert_to_deal(id, &actor).await }));
    }

    let mut converted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                converted += 1;
                assert_eq!(outcome.estimate.status, EstimateStatus::Deal);
            }
            Err(ServiceError::AlreadyConverted(_)) | Err(ServiceError::ConcurrentModification(_)) => {}
            Err(other) => panic!("unexpected conversion error: {:?}", other),
        }
    }
    assert_eq!(converted, 1);
    assert_eq!(world.store.leads_for_estimate(&id).unwrap().len(), 1);
}

#[tokio::test]
async fn second_estimate_inside_window_is_refused() {
    let world = World::new();
    let first = world.accepted("repeat@example.com").await;
    let second = world.accepted("repeat@example.com").await;
    assert_eq!(first.customer, second.customer);

    world.service.convert_to_deal(first.id, &world.admin).await.unwrap();
    let refused = world.service.convert_to_deal(second.id, &world.admin).await;
    assert!(matches!(refused, Err(ServiceError::DuplicateLeadWindow(_))));

    // Refusal happens before the claim, so the estimate is untouched
    let current = world.service.get_estimate(second.id, &world.admin).await.unwrap();
    assert_eq!(current.status, EstimateStatus::CustomerAccepted);
    assert!(current.deal_converted_at.is_none());
}

#[tokio::test]
async fn lead_older_than_window_does_not_block() {
    let world = World::new();
    let first = world.accepted("old@example.com").await;
    let second = world.accepted("old@example.com").await;
    world.service.convert_to_deal(first.id, &world.admin).await.unwrap();

    let mut lead = world.store.leads_for_estimate(&first.id).unwrap().remove(0);
    lead.created_at = Utc::now() - Duration::days(31);
    world.store.insert_lead(lead).unwrap();

    let outcome = world.service.convert_to_deal(second.id, &world.admin).await.unwrap();
    assert_eq!(outcome.records.lead.estimate, second.id);
}

#[tokio::test]
async fn zero_day_window_allows_back_to_back_deals() {
    let world = World::with_config(WorkflowConfig {
        duplicate_lead_window_days: 0,
        ..WorkflowConfig::default()
    });
    let first = world.accepted("often@example.com").await;
    let second = world.accepted("often@example.com").await;
    world.service.convert_to_deal(first.id, &world.admin).await.unwrap();
    assert!(world.service.convert_to_deal(second.id, &world.admin).await.is_ok());
}

#[tokio::test]
async fn mortgage_estimate_creates_application_bundle() {
    let world = World::new();
    let estimate = world
        .service
        .submit_estimate(world.request("loan@example.com", world.mortgage_category), None)
        .await
        .unwrap();
    assert_eq!(estimate.lead_type, LeadType::Mortgage);
    let id = estimate.id;

    world.service.assign_supervisor(id, world.supervisor.id, &world.superadmin).await.unwrap();
    world
        .service
        .send_to_freelancers(id, vec![world.freelancers[0].id], &world.supervisor)
        .await
        .unwrap();
    world
        .service
        .submit_quotation(id, common::draft(1.0, 250_000.0, None), &world.freelancers[0])
        .await
        .unwrap();
    world
        .service
        .create_final_quotation(id, common::draft(1.0, 240_000.0, None), &world.supervisor)
        .await
        .unwrap();
    world.service.approve_final_quotation(id, &world.superadmin).await.unwrap();
    world
        .service
        .customer_response(id, CustomerResponseStatus::Accepted, None, &World::customer_of(&estimate))
        .await
        .unwrap();

    let outcome = world.service.convert_to_deal(id, &world.superadmin).await.unwrap();
    let mortgage = outcome.records.mortgage.expect("mortgage bundle");
    assert_eq!(mortgage.application.loan_amount, 240_000.0);
    assert_eq!(mortgage.application.lead, outcome.records.lead.id);
    assert_eq!(mortgage.document.application_id, mortgage.application.application_id);
    assert_eq!(mortgage.basic_details.first_name, "Huda");
    assert_eq!(mortgage.basic_details.last_name, "Salem");
    assert_eq!(world.store.conversion_counts().unwrap(), (1, 1, 1, 1));
    assert_eq!(world.store.applications_for_estimate(&id).unwrap().len(), 1);
    assert!(world.notifier.wait_for(&id, "deal_created").await);
}

#[tokio::test]
async fn failed_bundle_releases_the_claim() {
    let world = World::new();
    let estimate = world.accepted("flaky@example.com").await;

    world.store.set_conversion_failure(true).unwrap();
    let failed = world.service.convert_to_deal(estimate.id, &world.admin).await;
    assert!(matches!(failed, Err(ServiceError::DependencyFailure(_))));

    let current = world.service.get_estimate(estimate.id, &world.admin).await.unwrap();
    assert_eq!(current.status, EstimateStatus::CustomerAccepted);
    assert!(current.deal_converted_at.is_none());
    assert!(current.deal_converted_by.is_none());
    assert_eq!(world.store.conversion_counts().unwrap(), (0, 0, 0, 0));

    world.store.set_conversion_failure(false).unwrap();
    let outcome = world.service.convert_to_deal(estimate.id, &world.admin).await.unwrap();
    assert_eq!(outcome.estimate.deal_converted_by, Some(world.admin.id));
    assert_eq!(world.store.conversion_counts().unwrap().0, 1);
}

#[tokio::test]
async fn intake_reuses_customers_by_email_then_mobile() {
    let world = World::new();
    let first = world.submit("same@example.com").await;
    let again = world.submit("SAME@example.com").await;
    assert_eq!(first.customer, again.customer);
    assert_eq!(again.customer_email, "same@example.com");

    let mut by_mobile = world.request("other@example.com", world.category);
    by_mobile.customer_mobile = MobileInput::Parts {
        country_code: Some("+971".to_string()),
        number: "501234567".to_string(),
    };
    let third = world.service.submit_estimate(by_mobile, None).await.unwrap();
    assert_eq!(third.customer, first.customer);
    assert_eq!(world.store.customer_count().unwrap(), 1);
}

#[tokio::test]
async fn signed_in_customer_owns_their_estimate() {
    let world = World::new();
    let customer = Actor::new(bson::oid::ObjectId::new(), Role::Customer);
    let estimate = world
        .service
        .submit_estimate(world.request("member@example.com", world.category), Some(customer.clone()))
        .await
        .unwrap();
    assert_eq!(estimate.customer, customer.id);
    assert_eq!(world.store.customer_count().unwrap(), 0);
    assert!(world.service.get_estimate(estimate.id, &customer).await.is_ok());
}

#[tokio::test]
async fn intake_validates_catalog_and_contact() {
    let world = World::new();

    let mut unknown = world.request("x@example.com", world.category);
    unknown.category = bson::oid::ObjectId::new().to_hex();
    assert!(matches!(
        world.service.submit_estimate(unknown, None).await,
        Err(ServiceError::Validation(_))
    ));

    let mut foreign = world.request("x@example.com", world.mortgage_category);
    foreign.subcategories = vec![world.subcategory.to_hex()];
    assert!(matches!(
        world.service.submit_estimate(foreign, None).await,
        Err(ServiceError::Validation(_))
    ));

    let mut bad_mobile = world.request("x@example.com", world.category);
    bad_mobile.customer_mobile = MobileInput::Text("12".to_string());
    assert!(matches!(
        world.service.submit_estimate(bad_mobile, None).await,
        Err(ServiceError::Validation(_))
    ));

    let mut bad_email = world.request("not-an-email", world.category);
    bad_email.customer_name = "H".to_string();
    assert!(matches!(
        world.service.submit_estimate(bad_email, None).await,
        Err(ServiceError::Validation(_))
    ));

    assert_eq!(world.store.customer_count().unwrap(), 0);
}

/// Never sees an open lead, like a read that raced another conversion.
struct StaleLeadReads {
    inner: InMemoryStore,
}

#[async_trait]
impl ConversionStore for StaleLeadReads {
    async fn latest_open_lead(&self, _customer: &ObjectId) -> RepositoryResult<Option<PropertyLead>> {
        Ok(None)
    }

    async fn create_bundle(
        &self,
        bundle: ConversionBundle,
        open_lead_cutoff: DateTime<Utc>,
    ) -> RepositoryResult<ConversionBundle> {
        self.inner.create_bundle(bundle, open_lead_cutoff).await
    }
}

#[tokio::test]
async fn window_is_enforced_when_records_are_written() {
    let world = World::with_stores(WorkflowConfig::default(), |store, mut stores| {
        stores.conversions = Arc::new(StaleLeadReads { inner: store.clone() });
        stores
    });
    let first = world.accepted("stale@example.com").await;
    let second = world.accepted("stale@example.com").await;

    world.service.convert_to_deal(first.id, &world.admin).await.unwrap();
    let refused = world.service.convert_to_deal(second.id, &world.admin).await;
    assert!(matches!(refused, Err(ServiceError::DuplicateLeadWindow(_))));

    let current = world.service.get_estimate(second.id, &world.admin).await.unwrap();
    assert_eq!(current.status, EstimateStatus::CustomerAccepted);
    assert!(current.deal_converted_at.is_none());
    assert_eq!(world.store.conversion_counts().unwrap().0, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conversions_for_one_customer_create_one_lead() {
    let world = World::new();
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(world.accepted("busy@example.com").await.id);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let service = world.service.clone();
        let actor = world.admin.clone();
        handles.push(tokio::spawn(async move { service.convert_to_deal(id, &actor).await }));
    }

    let mut converted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => converted += 1,
            Err(ServiceError::DuplicateLeadWindow(_)) => {}
            Err(other) => panic!("unexpected conversion error: {:?}", other),
        }
    }
    assert_eq!(converted, 1);
    assert_eq!(world.store.conversion_counts().unwrap().0, 1);

    let mut deals = 0;
    for id in ids {
        let current = world.service.get_estimate(id, &world.admin).await.unwrap();
        match current.status {
            EstimateStatus::Deal => deals += 1,
            EstimateStatus::CustomerAccepted => assert!(current.deal_converted_at.is_none()),
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(deals, 1);
}
