//! Example server: reads config from env (and `.env`), makes sure the database and settings
//! table exist, introspects the schema and serves the full router.

use pgdeck::{
    ensure_database_exists, ensure_settings_tables, router, AppConfig, AppState, SchemaRegistry,
    TableSettingsStore,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pgdeck=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    ensure_settings_tables(&pool, &config.settings_schema).await?;
    let schema = SchemaRegistry::load(&pool, &config.schema_name, &config.included_tables).await?;
    let settings = TableSettingsStore::load(&pool, &config.settings_schema).await?;

    let listen_addr = config.listen_addr;
    let state = AppState::new(pool, config, schema, settings);
    let app = router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
