use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryScreeningStore, InMemoryStudentDirectory};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use school_screening::config::AppConfig;
use school_screening::error::AppError;
use school_screening::roster::RosterImporter;
use school_screening::screening::ScreeningService;
use school_screening::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(roster) = args.roster.take() {
        config.screening.roster_path = Some(roster);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let students = match &config.screening.roster_path {
        Some(path) => {
            let students = RosterImporter::from_path(path)?;
            info!(count = students.len(), path = %path.display(), "student roster loaded");
            students
        }
        None => {
            warn!("no roster configured; student directory starts empty");
            Vec::new()
        }
    };

    let screening_service = Arc::new(ScreeningService::new(
        Arc::new(InMemoryStudentDirectory::from_students(students)),
        Arc::new(InMemoryScreeningStore::default()),
        config.screening.untyped_notes,
    ));

    let app = with_screening_routes(screening_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        notes_policy = config.screening.untyped_notes.label(),
        "school screening service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
