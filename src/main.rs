use anyhow::Context;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filebed=info,tower_http=info".into()),
        )
        .init();

    let config = filebed::config::Config::from_env().context("loading configuration")?;
    let db = filebed::db::Database::connect(&config.database_url)
        .await
        .context("opening metadata store")?;

    // Schema healing runs before anything touches the database; a failure
    // here aborts boot rather than serving against a broken schema.
    db.ensure_schema().await.context("ensuring metadata schema")?;

    let webhook_url = config.webhook_url.clone();
    let server_address = config.server_address.clone();
    let state = filebed::build_state(config, db)?;

    if let Some(url) = webhook_url {
        if let Err(e) = state.bot.set_webhook(&url).await {
            warn!("webhook registration failed, bot updates will not arrive: {}", e);
        }
    }

    let app = filebed::routes::router(state);
    let listener = tokio::net::TcpListener::bind(&server_address)
        .await
        .with_context(|| format!("binding {}", server_address))?;

    info!("listening on {}", server_address);
    axum::serve(listener, app).await?;

    Ok(())
}
