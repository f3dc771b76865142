use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{AppConfig, EmailConfig, JwtConfig, MongoConfig, WorkflowConfig};
use crate::middlewares::auth_middleware::AuthState;
use crate::repository::stores::WorkflowStores;
use crate::router::estimate_router::estimate_router;
use crate::router::quotation_router::quotation_router;
use crate::service::estimate_service::EstimateServiceImpl;
use crate::service::quotation_service::QuotationServiceImpl;
use crate::util::email::EmailNotifier;
use crate::util::jwt::JwtTokenUtilsImpl;
use crate::util::notifier::{LogNotifier, Notifier};

pub struct App {
    config: AppConfig,
    router: Router,
    pub estimate_service: Arc<EstimateServiceImpl>,
    pub quotation_service: Arc<QuotationServiceImpl>,
}

/// Assembles every route on top of already-built services.
pub fn build_router(
    estimate_service: Arc<EstimateServiceImpl>,
    quotation_service: Arc<QuotationServiceImpl>,
    auth_state: Arc<AuthState>,
) -> Router {
    Router::new()
        .merge(estimate_router(estimate_service, auth_state.clone()))
        .merge(quotation_router(quotation_service, auth_state))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
}

impl App {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::from_env();
        let jwt_config = JwtConfig::from_env()?;
        let mongo_config = MongoConfig::from_env()?;
        let workflow_config = WorkflowConfig::from_env()?;

        let stores = WorkflowStores::mongo(&mongo_config).await?;
        let notifier: Arc<dyn Notifier> = match EmailConfig::from_env_optional()? {
            Some(email_config) => Arc::new(EmailNotifier::new(email_config)?),
            None => {
                warn!("Using log notifier");
                Arc::new(LogNotifier)
            }
        };

        let estimate_service = Arc::new(EstimateServiceImpl::new(
            stores.clone(),
            notifier,
            workflow_config.clone(),
        ));
        let quotation_service = Arc::new(QuotationServiceImpl::new(stores, workflow_config));
        let auth_state = Arc::new(AuthState::new(JwtTokenUtilsImpl::new(jwt_config)));

        let router = build_router(estimate_service.clone(), quotation_service.clone(), auth_state);
        Ok(App {
            config,
            router,
            estimate_service,
            quotation_service,
        })
    }

    pub async fn start(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.socket_addr()?;
        info!("Server running at http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
