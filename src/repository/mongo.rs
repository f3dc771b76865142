use mongodb::{
    options::{ClientOptions, Credential, ResolverConfig},
    Client, Database,
};
use tracing::info;

use crate::config::mongo_conf::MongoConfig;

/// Opens a client from `MongoConfig` and returns it with the configured database.
///
/// The client owns the connection pool; every repository built from the same
/// client shares it, and transactions need all collections on one client.
pub async fn connect(config: &MongoConfig) -> Result<(Client, Database), mongodb::error::Error> {
    let mut client_options =
        ClientOptions::parse_with_resolver_config(&config.uri, ResolverConfig::cloudflare()).await?;
    client_options.app_name = Some("EstimateWorkflow".to_string());
    client_options.max_pool_size = Some(config.pool_size);
    client_options.connect_timeout = Some(std::time::Duration::from_secs(config.connection_timeout_secs));

    if let (Some(ref username), Some(ref password)) = (&config.username, &config.password) {
        client_options.credential = Some(
            Credential::builder()
                .username(username.clone())
                .password(password.clone())
                .build(),
        );
    }

    let client = Client::with_options(client_options)?;
    let database = client.database(&config.database);
    info!(database = %config.database, "MongoDB client initialised");
    Ok((client, database))
}

/// `(skip, limit)` for 1-based page numbers.
pub(crate) fn page_window(page: u32, limit: u32) -> (u64, i64) {
    let page = page.max(1);
    ((page as u64 - 1) * limit as u64, limit as i64)
}
