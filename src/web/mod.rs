pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    models::{get_classifier, ModelManager, ModelStats},
    storage::{CaseRecordStore, ImageStore, LocalImageStore},
    triage::{TriagePipeline, TriageTimeouts},
    utils::error::TriageError,
    Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TriagePipeline>,
    pub config: Config,
}

impl AppState {
    pub fn records(&self) -> &Arc<CaseRecordStore> {
        self.pipeline.records()
    }
}

pub async fn serve(config: Config) -> Result<()> {
    // 初始化模型管理器
    ModelManager::init(&config)?;

    let records = Arc::new(CaseRecordStore::open(&config.storage_config).await?);
    let images: Arc<dyn ImageStore> =
        Arc::new(LocalImageStore::new(&config.storage_config.uploads_dir).await?);
    let pipeline = Arc::new(TriagePipeline::new(
        get_classifier()?,
        records,
        images,
        TriageTimeouts::from_config(&config),
    ));

    let app = create_app(AppState {
        pipeline,
        config: config.clone(),
    });

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        TriageError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST   /cases            - Multipart scan upload");
    tracing::info!("  POST   /cases/json       - JSON base64 scan upload");
    tracing::info!("  GET    /cases            - Case history, newest first");
    tracing::info!("  GET    /cases/:id        - Case record");
    tracing::info!("  GET    /cases/:id/image  - Stored scan of a case");
    tracing::info!("  DELETE /cases/:id        - Delete case record and scan");
    tracing::info!("  GET    /health           - Health check");
    tracing::info!("  GET    /api/info         - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        TriageError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| TriageError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = &state.config.server_config;

    Router::new()
        .route(
            "/cases",
            post(handlers::create_case_upload).get(handlers::list_cases),
        )
        .route("/cases/json", post(handlers::create_case_json))
        .route(
            "/cases/:id",
            get(handlers::get_case).delete(handlers::delete_case),
        )
        .route("/cases/:id/image", get(handlers::get_case_image))
        .route("/cases/:id/delete", post(handlers::delete_case))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // multipart 默认 2MB 限制由 RequestBodyLimitLayer 统一接管
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server_config.request_timeout,
        )))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let records = state.records().count().await?;
    Ok(Json(json!({
        "status": "healthy",
        "records": records,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let stats = ModelStats::collect(state.pipeline.classifier(), &state.config);
    let records = state.records().count().await?;

    Ok(Json(json!({
        "service": "NeuroScan Triage Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": stats,
        "records": records,
        "features": {
            "dual_upload_modes": true,
            "persistent_history": true,
            "input_shape": crate::image::INPUT_SHAPE,
        }
    })))
}
