use crate::cli::ServeArgs;
use crate::infra::{demo_catalog_present, seed_demo_catalog, AppState};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use placement_cell::config::AppConfig;
use placement_cell::error::AppError;
use placement_cell::telemetry;
use placement_cell::workflows::profiles::ProfileService;
use placement_cell::workflows::recruitment::{
    CatalogStore, EnrollmentService, InMemoryPlacementStore, QueuedNotificationDispatcher,
    SessionTokens, SqlitePlacementStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.store.database_path.clone() {
        Some(path) => {
            let store = Arc::new(SqlitePlacementStore::open(&path)?);
            info!(path = %path.display(), "using sqlite placement store");
            if args.seed_demo && !demo_catalog_present(store.as_ref())? {
                seed_demo_catalog(store.as_ref(), Local::now().date_naive())?;
                info!("seeded demo catalog");
            }
            serve(config, store).await
        }
        None => {
            let store = Arc::new(InMemoryPlacementStore::new());
            seed_demo_catalog(store.as_ref(), Local::now().date_naive())?;
            info!("using in-memory placement store seeded with the demo catalog");
            serve(config, store).await
        }
    }
}

async fn serve<S>(config: AppConfig, store: Arc<S>) -> Result<(), AppError>
where
    S: CatalogStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (notifier, _delivery) = QueuedNotificationDispatcher::spawn();
    let tokens = Arc::new(SessionTokens::from_config(&config.identifiers)?);
    let enrollment = Arc::new(EnrollmentService::new(
        store.clone(),
        Arc::new(notifier),
        tokens,
    ));
    let profiles = Arc::new(ProfileService::new(store));

    let app = with_placement_routes(enrollment, profiles)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement cell service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
