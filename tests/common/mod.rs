#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;

use estimate_workflow::config::WorkflowConfig;
use estimate_workflow::dto::estimate_dto::SubmitEstimateRequest;
use estimate_workflow::model::category::{Category, CategoryKind, Subcategory};
use estimate_workflow::model::estimate::{CustomerResponseStatus, Estimate};
use estimate_workflow::model::user::{Actor, Role, User};
use estimate_workflow::repository::memory::InMemoryStore;
use estimate_workflow::repository::stores::WorkflowStores;
use estimate_workflow::service::estimate_service::{EstimateService, EstimateServiceImpl};
use estimate_workflow::service::pricing::{ItemDraft, QuotationDraft};
use estimate_workflow::service::quotation_service::QuotationServiceImpl;
use estimate_workflow::util::mobile::MobileInput;
use estimate_workflow::util::notifier::{Notification, NotificationError, Notifier};

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn events_for(&self, estimate: &ObjectId) -> Vec<&'static str> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| &n.estimate_id == estimate)
            .map(|n| n.event.name())
            .collect()
    }

    /// Notifications go out on spawned tasks; give them a moment to land.
    pub async fn wait_for(&self, estimate: &ObjectId, event: &str) -> bool {
        for _ in 0..50 {
            if self.events_for(estimate).contains(&event) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub struct World {
    pub store: InMemoryStore,
    pub service: Arc<EstimateServiceImpl>,
    pub quotations: Arc<QuotationServiceImpl>,
    pub notifier: Arc<RecordingNotifier>,
    pub superadmin: Actor,
    pub admin: Actor,
    pub supervisor: Actor,
    pub other_supervisor: Actor,
    pub freelancers: Vec<Actor>,
    pub category: ObjectId,
    pub subcategory: ObjectId,
    pub mortgage_category: ObjectId,
}

fn user(role: Role, name: &str) -> User {
    User {
        id: ObjectId::new(),
        first_name: name.to_string(),
        last_name: "Test".to_string(),
        email: format!("{}@staff.example.com", name.to_lowercase()),
        role,
        active: true,
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorkflowConfig::default())
    }

    pub fn with_config(config: WorkflowConfig) -> Self {
        Self::with_stores(config, |_, stores| stores)
    }

    /// Lets a test put its own repository in front of the seeded store.
    pub fn with_stores(
        config: WorkflowConfig,
        wrap: impl FnOnce(&InMemoryStore, WorkflowStores) -> WorkflowStores,
    ) -> Self {
        let store = InMemoryStore::new();
        let mut actors = Vec::new();
        for (role, name) in [
            (Role::Superadmin, "Root"),
            (Role::Admin, "Ops"),
            (Role::Supervisor, "Samir"),
            (Role::Supervisor, "Sara"),
            (Role::Freelancer, "Farid"),
            (Role::Freelancer, "Fatima"),
        ] {
            let u = user(role, name);
            actors.push(Actor::new(u.id, role));
            store.insert_user(u).unwrap();
        }

        let category = Category {
            id: ObjectId::new(),
            name: "Painting".to_string(),
            kind: CategoryKind::Service,
            active: true,
        };
        let subcategory = Subcategory {
            id: ObjectId::new(),
            category: category.id,
            name: "Interior".to_string(),
            active: true,
        };
        let mortgage_category = Category {
            id: ObjectId::new(),
            name: "Home Finance".to_string(),
            kind: CategoryKind::Mortgage,
            active: true,
        };
        let ids = (category.id, subcategory.id, mortgage_category.id);
        store.insert_category(category).unwrap();
        store.insert_subcategory(subcategory).unwrap();
        store.insert_category(mortgage_category).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let stores = wrap(&store, WorkflowStores::in_memory(store.clone()));
        let service = Arc::new(EstimateServiceImpl::new(stores.clone(), notifier.clone(), config.clone()));
        let quotations = Arc::new(QuotationServiceImpl::new(stores, config));

        World {
            store,
            service,
            quotations,
            notifier,
            superadmin: actors[0].clone(),
            admin: actors[1].clone(),
            supervisor: actors[2].clone(),
            other_supervisor: actors[3].clone(),
            freelancers: vec![actors[4].clone(), actors[5].clone()],
            category: ids.0,
            subcategory: ids.1,
            mortgage_category: ids.2,
        }
    }

    pub fn request(&self, email: &str, category: ObjectId) -> SubmitEstimateRequest {
        SubmitEstimateRequest {
            customer_name: "Huda Salem".to_string(),
            customer_email: email.to_string(),
            customer_mobile: MobileInput::Text("0501234567".to_string()),
            category: category.to_hex(),
            subcategories: if category == self.category {
                vec![self.subcategory.to_hex()]
            } else {
                vec![]
            },
            description: "Paint the living room".to_string(),
            attachments: vec![],
        }
    }

    pub async fn submit(&self, email: &str) -> Estimate {
        self.service
            .submit_estimate(self.request(email, self.category), None)
            .await
            .unwrap()
    }

    pub fn customer_of(estimate: &Estimate) -> Actor {
        Actor::new(estimate.customer, Role::Customer)
    }

    /// pending -> assigned, dispatched to every fixture freelancer, all of
    /// whom quote. Leaves the estimate ready for the final quotation.
    pub async fn collected(&self, email: &str) -> Estimate {
        let estimate = self.submit(email).await;
        let id = estimate.id;
        self.service
            .assign_supervisor(id, self.supervisor.id, &self.superadmin)
            .await
            .unwrap();
        let ids = self.freelancers.iter().map(|f| f.id).collect();
        self.service
            .send_to_freelancers(id, ids, &self.supervisor)
            .await
            .unwrap();
        let mut last = None;
        for (n, freelancer) in self.freelancers.iter().enumerate() {
            let submission = self
                .service
                .submit_quotation(id, draft(100.0, 5.0 + n as f64, None), freelancer)
                .await
                .unwrap();
            last = Some(submission.estimate);
        }
        last.unwrap()
    }

    /// Drives an estimate all the way to `superadmin_approved` with the
    /// 100 x 5.00 at 10% final quotation.
    pub async fn approved(&self, email: &str) -> Estimate {
        let estimate = self.collected(email).await;
        self.service
            .create_final_quotation(estimate.id, draft(100.0, 5.0, Some(10.0)), &self.supervisor)
            .await
            .unwrap();
        self.service
            .approve_final_quotation(estimate.id, &self.superadmin)
            .await
            .unwrap()
            .estimate
    }

    pub async fn accepted(&self, email: &str) -> Estimate {
        let estimate = self.approved(email).await;
        self.service
            .customer_response(estimate.id, CustomerResponseStatus::Accepted, None, &Self::customer_of(&estimate))
            .await
            .unwrap()
    }
}

pub fn draft(quantity: f64, unit_price: f64, discount_percent: Option<f64>) -> QuotationDraft {
    QuotationDraft {
        scope_of_work: "Two coats, walls and ceiling".to_string(),
        items: vec![ItemDraft {
            sno: None,
            item: "Paint".to_string(),
            description: None,
            unit: "sqft".to_string(),
            quantity,
            unit_price,
        }],
        discount_percent,
    }
}
