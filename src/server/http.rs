use crate::{
    config::SERVICE_NAME,
    media::{normalize, FailureKind, FormatRecord, ResolutionResult, Resolver},
    utils::truncate_detail,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// Query parameters that may carry the video token, in priority order.
const TOKEN_PARAMS: [&str; 3] = ["vid", "url", "id"];
const DETAIL_LIMIT: usize = 500;
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

pub fn router(state: AppState, cors_origin: &str) -> Result<Router> {
    Ok(Router::new()
        .route("/", get(root))
        .route("/streams", get(streams))
        .layer(cors_layer(cors_origin)?)
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(cors_origin: &str) -> Result<CorsLayer> {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(cors_origin)
            .with_context(|| format!("Invalid CORS origin {:?}", cors_origin))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(PREFLIGHT_MAX_AGE))
}

/// Preflights carry no body, so answer them with 204 instead of the CORS layer's 200.
async fn preflight_no_content(request: Request<Body>, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    detail: Option<Value>,
}

impl ApiError {
    fn bad_video_id() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "bad-video-id",
            detail: None,
        }
    }

    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "internal",
            detail: Some(Value::String(truncate_detail(message, DETAIL_LIMIT))),
        }
    }

    fn resolution_failed(kind: FailureKind, detail: Value) -> Self {
        match kind {
            FailureKind::NoProgressiveMp4 => Self {
                status: StatusCode::NOT_FOUND,
                error: kind.as_str(),
                detail: None,
            },
            FailureKind::AllProvidersFailed => Self {
                status: StatusCode::BAD_GATEWAY,
                error: kind.as_str(),
                detail: Some(detail),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "ok": false,
            "error": self.error,
        });
        if let Some(detail) = self.detail {
            body["detail"] = detail;
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    ok: bool,
    provider: String,
    formats: Vec<FormatRecord>,
}

async fn root() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "usage": "/streams?vid=VIDEO_ID",
    }))
}

async fn streams(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<StreamsResponse>> {
    let token = TOKEN_PARAMS
        .iter()
        .filter_map(|key| params.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty());

    let video = normalize(token).map_err(|_| {
        info!("Rejected video token {:?}", token);
        ApiError::bad_video_id()
    })?;

    // Detached so a dropped client still lets the result reach the cache.
    let resolver = state.resolver.clone();
    let task = tokio::spawn(async move { resolver.resolve(&video).await });
    let result = task.await.map_err(|e| {
        error!("Resolution task failed: {}", e);
        ApiError::internal(&e.to_string())
    })?;
    info!(
        "Resolution finished success={} attempts={}",
        result.is_success(),
        result.attempts().len()
    );

    match result {
        ResolutionResult::Success {
            provider, formats, ..
        } => Ok(Json(StreamsResponse {
            ok: true,
            provider,
            formats,
        })),
        ResolutionResult::Failure {
            kind,
            detail,
            attempts,
        } => {
            let detail = json!({
                "message": truncate_detail(&detail, DETAIL_LIMIT),
                "attempts": attempts,
            });
            Err(ApiError::resolution_failed(kind, detail))
        }
    }
}
