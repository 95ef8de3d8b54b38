use geoloc_core::store::{StoreError, SurrealLocationStore};
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::config::GeolocConfig;

const MEMORY_ENDPOINT: &str = "mem://";

fn endpoint(config: &GeolocConfig) -> &str {
    match (&config.db_uri, config.db_in_memory) {
        (Some(uri), false) => uri.as_str(),
        _ => MEMORY_ENDPOINT,
    }
}

/// Connects to the configured database and selects its namespace.
///
/// # Errors
/// Returns any connection, sign-in, or namespace selection error.
pub async fn connect_database(config: &GeolocConfig) -> Result<Surreal<Any>, surrealdb::Error> {
    let endpoint = endpoint(config);
    let db = connect(endpoint).await?;

    if let (Some(username), Some(password)) =
        (config.db_username.as_ref(), config.db_password.as_ref())
    {
        db.signin(Root {
            username: username.as_str(),
            password: password.as_str(),
        })
        .await?;
    }

    db.use_ns(&config.db_namespace)
        .use_db(&config.db_name)
        .await?;

    info!(
        endpoint,
        namespace = %config.db_namespace,
        database = %config.db_name,
        "connected to surrealdb"
    );
    Ok(db)
}

/// Counts every partition once so an unreachable store fails startup.
///
/// # Errors
/// Returns the store error from the first failing count.
pub async fn probe_store(store: &SurrealLocationStore<Any>) -> Result<(), StoreError> {
    for (partition, count) in store.probe().await? {
        info!(collection = %partition, count, "collection ready");
    }
    Ok(())
}
