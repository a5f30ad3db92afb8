use std::sync::Arc;

use anyhow::Result;
use coach_planner::api::{create_routes, AppState};
use coach_planner::auth::JwtService;
use coach_planner::config::{run_migrations, AppConfig, DatabaseConfig};
use coach_planner::repository::{PgStore, Store};
use coach_planner::services::{BackgroundJobService, HttpPlanGenerator, PlanGenerator, SessionService};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let generator: Option<Arc<dyn PlanGenerator>> = match &config.plan_generator_url {
        Some(url) => Some(Arc::new(HttpPlanGenerator::new(
            url.clone(),
            config.plan_generator_api_key.clone(),
            config.plan_generator_timeout,
        )?)),
        None => {
            warn!("PLAN_GENERATOR_URL not set, plan generation disabled");
            None
        }
    };

    let jobs = BackgroundJobService::new(SessionService::new(store.clone()), config.default_timezone).await?;
    jobs.start(&config.session_promotion_cron).await?;

    let state = AppState::new(
        store,
        JwtService::new(&config.jwt_secret),
        generator,
        config.default_timezone,
        config.recent_completed_days,
    );
    let app = create_routes(state);

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!(environment = %config.environment, "Coach planner server starting on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app).await?;

    jobs.stop().await?;
    Ok(())
}
