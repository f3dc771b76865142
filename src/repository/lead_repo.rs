use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::{
    options::{FindOneOptions, IndexOptions},
    Client, ClientSession, Collection, Database, IndexModel,
};
use tracing::{debug, error, info, warn};

use crate::config::mongo_conf::CollectionNames;
use crate::model::lead::{LeadStatus, PropertyLead};
use crate::model::mortgage::{
    ConversionBundle, CustomerBasicDetails, CustomerDocument, MortgageApplication,
};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};

/// Storage for the records a conversion produces.
#[async_trait]
pub trait ConversionStore: Send + Sync {
    /// Most recent lead of the customer that has not been converted yet.
    async fn latest_open_lead(&self, customer: &ObjectId) -> RepositoryResult<Option<PropertyLead>>;
    /// Persists every record of the bundle, or none of them. Fails with
    /// `Conflict` when the customer gained an open lead created after
    /// `open_lead_cutoff`, so two conversions for one customer cannot both
    /// pass the duplicate-lead window.
    async fn create_bundle(
        &self,
        bundle: ConversionBundle,
        open_lead_cutoff: DateTime<Utc>,
    ) -> RepositoryResult<ConversionBundle>;
}

pub struct MongoConversionStore {
    client: Client,
    customers: Collection<Document>,
    leads: Collection<PropertyLead>,
    applications: Collection<MortgageApplication>,
    documents: Collection<CustomerDocument>,
    basic_details: Collection<CustomerBasicDetails>,
}

impl MongoConversionStore {
    pub async fn new(client: Client, db: &Database, names: &CollectionNames) -> Result<Self, mongodb::error::Error> {
        let leads = db.collection::<PropertyLead>(&names.property_leads);
        leads
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "estimate": 1 })
                        .options(IndexOptions::builder().name("one_lead_per_estimate".to_string()).unique(true).build())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "customer": 1, "created_at": -1 })
                        .options(IndexOptions::builder().name("customer_created_at".to_string()).build())
                        .build(),
                ],
                None,
            )
            .await?;
        let applications = db.collection::<MortgageApplication>(&names.mortgage_applications);
        applications
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "estimate": 1 })
                    .options(IndexOptions::builder().name("one_application_per_estimate".to_string()).unique(true).build())
                    .build(),
                None,
            )
            .await?;
        debug!("Conversion indexes ensured");

        Ok(MongoConversionStore {
            client,
            customers: db.collection::<Document>(&names.customers),
            leads,
            applications,
            documents: db.collection::<CustomerDocument>(&names.customer_documents),
            basic_details: db.collection::<CustomerBasicDetails>(&names.customer_basic_details),
        })
    }

    async fn insert_all(
        &self,
        bundle: &ConversionBundle,
        open_lead_cutoff: DateTime<Utc>,
        session: &mut ClientSession,
    ) -> RepositoryResult<()> {
        // Writing the customer first makes concurrent conversions for the same
        // customer collide with a write conflict instead of both committing.
        self.customers
            .update_one_with_session(
                doc! { "_id": bundle.lead.customer },
                doc! { "$set": { "last_conversion_at": bson::to_bson(&bundle.lead.created_at)? } },
                None,
                session,
            )
            .await?;
        let options = FindOneOptions::builder().sort(doc! { "created_at": -1 }).build();
        let open = self
            .leads
            .find_one_with_session(Self::open_lead_filter(&bundle.lead.customer), options, session)
            .await?;
        if let Some(lead) = open {
            if lead.estimate == bundle.lead.estimate {
                return Err(RepositoryError::already_exists(format!(
                    "Duplicate key: lead for estimate {}",
                    lead.estimate
                )));
            }
            if lead.created_at > open_lead_cutoff {
                return Err(RepositoryError::conflict(format!(
                    "customer {} already has open lead {}",
                    lead.customer, lead.lead_id
                )));
            }
        }

        self.leads.insert_one_with_session(&bundle.lead, None, session).await?;
        if let Some(ref mortgage) = bundle.mortgage {
            self.applications
                .insert_one_with_session(&mortgage.application, None, session)
                .await?;
            self.documents
                .insert_one_with_session(&mortgage.document, None, session)
                .await?;
            self.basic_details
                .insert_one_with_session(&mortgage.basic_details, None, session)
                .await?;
        }
        Ok(())
    }
}

impl MongoConversionStore {
    fn open_lead_filter(customer: &ObjectId) -> Document {
        doc! {
            "customer": customer,
            "status": { "$ne": LeadStatus::Converted.as_str() },
        }
    }
}

#[async_trait]
impl ConversionStore for MongoConversionStore {
    #[tracing::instrument(skip(self), fields(customer = %customer))]
    async fn latest_open_lead(&self, customer: &ObjectId) -> RepositoryResult<Option<PropertyLead>> {
        let options = FindOneOptions::builder().sort(doc! { "created_at": -1 }).build();
        self.leads
            .find_one(Self::open_lead_filter(customer), options)
            .await
            .map_err(|e| RepositoryError::database(format!("Failed to find open lead: {}", e)))
    }

    #[tracing::instrument(skip(self, bundle), fields(lead_id = %bundle.lead.lead_id, estimate = %bundle.lead.estimate))]
    async fn create_bundle(
        &self,
        bundle: ConversionBundle,
        open_lead_cutoff: DateTime<Utc>,
    ) -> RepositoryResult<ConversionBundle> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        if let Err(e) = self.insert_all(&bundle, open_lead_cutoff, &mut session).await {
            error!("Conversion bundle failed, aborting transaction: {}", e);
            if let Err(abort) = session.abort_transaction().await {
                warn!("Failed to abort conversion transaction: {}", abort);
            }
            return Err(e);
        }

        session.commit_transaction().await.map_err(|e| {
            error!("Failed to commit conversion transaction: {}", e);
            RepositoryError::from(e)
        })?;
        info!(mortgage = bundle.mortgage.is_some(), "Conversion bundle committed");
        Ok(bundle)
    }
}
