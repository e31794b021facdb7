use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ti_radar::config::Config;
use ti_radar::{AppState, handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::radar::analyze_technology,
        handlers::data::health_check,
        handlers::data::data_metadata,
        handlers::suggestions::suggest_technologies,
    ),
    components(
        schemas(
            models::RadarRequest,
            models::RadarResponse,
            models::LandscapePanel,
            models::MaturityPanel,
            models::CompetitivePanel,
            models::FundingPanel,
            models::CpcFlowPanel,
            models::GeographicPanel,
            models::ResearchImpactPanel,
            models::TemporalPanel,
            models::ExplainabilityMetadata,
            models::ApiAlert,
            models::LandscapeYear,
            models::CountryActivity,
            models::MaturityYear,
            models::FittedPoint,
            models::ActorShare,
            models::ActorRecord,
            models::NetworkNode,
            models::NetworkEdge,
            models::FundingYear,
            models::ProgrammeFunding,
            models::ProgrammeYearFunding,
            models::InstrumentFunding,
            models::CpcYearData,
            models::CityCount,
            models::CountryPair,
            models::CitationYear,
            models::TopPaper,
            models::VenueCount,
            models::PublicationTypeCount,
            models::ActorDynamicsYear,
            models::ActorTimeline,
            models::ProgrammeEvolutionYear,
            models::BreadthYear,
        )
    ),
    tags(
        (name = "Radar", description = "Technology radar analysis"),
        (name = "Data", description = "Health, metadata, and suggestions"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ti-radar.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Technology Intelligence Radar starting up");

    if config.data.patents_db_available() {
        tracing::info!("Patents DB: {}", config.data.patents_db_path);
    } else {
        tracing::warn!("Patents DB not found: {}", config.data.patents_db_path);
    }
    if config.data.cordis_db_available() {
        tracing::info!("CORDIS DB: {}", config.data.cordis_db_path);
    } else {
        tracing::warn!("CORDIS DB not found: {}", config.data.cordis_db_path);
    }
    // Key status only, never the keys themselves
    tracing::info!(
        "OpenAIRE: {}",
        if config.apis.openaire_access_token.is_empty() { "public access" } else { "token configured" }
    );
    tracing::info!(
        "Semantic Scholar: {}",
        if config.apis.semantic_scholar_api_key.is_empty() { "public access" } else { "API key configured" }
    );

    let app_state = Arc::new(AppState::new(config.clone()));

    let api_routes = Router::new()
        .route("/api/v1/radar", post(handlers::radar::analyze_technology))
        .route("/api/v1/data/metadata", get(handlers::data::data_metadata))
        .route("/api/v1/suggestions", get(handlers::suggestions::suggest_technologies))
        .route("/health", get(handlers::data::health_check))
        .with_state(Arc::clone(&app_state));

    let cors_layer = build_cors_layer(&config);

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS from the configured origin list; "*" falls back to permissive.
fn build_cors_layer(config: &Config) -> CorsLayer {
    let origins = config.cors.origin_list();
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
