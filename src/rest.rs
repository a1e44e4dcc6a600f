use crate::engine::Engine;
use crate::error::AppError;
use crate::model::{ActingUser, Record, Target, TargetData};
use crate::page::{Page, PageParams};
use crate::info;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

// Our own JSON extractor wrapping `axum::Json` so rejections are formatted
// through AppError like every other failure.
#[derive(axum::extract::FromRequest, Deserialize)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::JsonRejection(rej) => rej.body_text(),
            other                        => other.to_string(),
        };
        (status, AppJson(ErrorResponse { message, code: status.as_u16() })).into_response()
    }
}

#[derive(Clone)]
pub struct RequestState {
    pub engine: Arc<Engine>,
}

#[derive(OpenApi)]
#[openapi(info(license(name = "MIT")))]
pub struct ApiDoc;

/// Acting-user context from the `x-user-id` / `x-user-admin` headers;
/// anonymous when absent. Real authentication sits in front of this
/// service.
fn acting_user(headers: &HeaderMap) -> ActingUser {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let admin = headers
        .get("x-user-admin")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    match id {
        Some(id) => ActingUser { id, admin },
        None => ActingUser::anonymous(),
    }
}

/// Path segment ids arrive as strings; numeric ones are compared as numbers.
fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Deserialize, IntoParams)]
struct ResolveQuery {
    full: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
struct DepthQuery {
    depth: Option<i64>,
}

#[utoipa::path(post, path = "/analyze", responses((status = 204, description = "Schema analyzed")))]
async fn analyze(State(state): State<RequestState>) -> Result<StatusCode, AppError> {
    state.engine.analyze().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/targets", responses((status = 200, description = "All registered targets")))]
async fn list_targets(State(state): State<RequestState>) -> Result<AppJson<Vec<Target>>, AppError> {
    Ok(AppJson(state.engine.list_targets().await?))
}

#[utoipa::path(put, path = "/targets", request_body = Target,
    responses((status = 200, description = "Target upserted"), (status = 400, description = "Invalid descriptor", body = ErrorResponse)))]
async fn upsert_target(
    State(state): State<RequestState>,
    AppJson(target): AppJson<Target>,
) -> Result<AppJson<Target>, AppError> {
    Ok(AppJson(state.engine.upsert_target(target).await?))
}

#[utoipa::path(get, path = "/targets/{identifier}", params(("identifier" = String, Path), ResolveQuery),
    responses((status = 200, description = "Resolved target"), (status = 404, description = "Unknown target", body = ErrorResponse)))]
async fn resolve_target(
    State(state): State<RequestState>,
    Path(identifier): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<AppJson<TargetData>, AppError> {
    state
        .engine
        .resolve(&identifier, query.full.unwrap_or(false))
        .await?
        .map(AppJson)
        .ok_or_else(|| AppError::not_found(format!("target '{}'", identifier)))
}

#[utoipa::path(get, path = "/records/{target}", params(("target" = String, Path), PageParams),
    responses((status = 200, description = "One page of records")))]
async fn list_records(
    State(state): State<RequestState>,
    Path(target): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<AppJson<Page<Record>>, AppError> {
    Ok(AppJson(state.engine.list(&target, &params).await?))
}

#[utoipa::path(get, path = "/records/{target}/{id}", params(("target" = String, Path), ("id" = String, Path), DepthQuery),
    responses((status = 200, description = "One record with relations expanded"), (status = 404, description = "Missing", body = ErrorResponse)))]
async fn get_record(
    State(state): State<RequestState>,
    Path((target, id)): Path<(String, String)>,
    Query(query): Query<DepthQuery>,
) -> Result<AppJson<Record>, AppError> {
    Ok(AppJson(state.engine.get(&target, &parse_id(&id), query.depth).await?))
}

#[utoipa::path(post, path = "/records/{target}",
    responses((status = 200, description = "Saved record"), (status = 404, description = "Unknown target", body = ErrorResponse)))]
async fn save_record(
    State(state): State<RequestState>,
    Path(target): Path<String>,
    headers: HeaderMap,
    AppJson(payload): AppJson<Value>,
) -> Result<AppJson<Record>, AppError> {
    let Value::Object(record) = payload else {
        return Err(AppError::BadRequest("payload must be a JSON object".to_string()));
    };
    let user = acting_user(&headers);
    Ok(AppJson(state.engine.save(&target, record, &user).await?))
}

#[utoipa::path(delete, path = "/records/{target}/{id}", params(("target" = String, Path), ("id" = String, Path)),
    responses((status = 200, description = "Removed record"), (status = 404, description = "Missing", body = ErrorResponse)))]
async fn remove_record(
    State(state): State<RequestState>,
    Path((target, id)): Path<(String, String)>,
) -> Result<AppJson<Record>, AppError> {
    Ok(AppJson(state.engine.remove(&target, &parse_id(&id)).await?))
}

pub fn build_router(state: RequestState, cors: Option<CorsLayer>) -> Router<()> {
    let router: OpenApiRouter<RequestState> = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(analyze))
        .routes(routes!(list_targets, upsert_target))
        .routes(routes!(resolve_target))
        .routes(routes!(list_records, save_record))
        .routes(routes!(get_record, remove_record));
    let (router, openapi) = router.split_for_parts();
    let merged = router
        .merge(SwaggerUi::new("/swagger-ui").url("/apidoc/openapi.json", openapi))
        .with_state(state);
    if let Some(cors_layer) = cors {
        merged.layer(cors_layer)
    } else {
        merged
    }
}

pub async fn serve(
    state: RequestState,
    socket_addr: SocketAddr,
    cors: Option<CorsLayer>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let router = build_router(state, cors);
    let tcp = TcpListener::bind(socket_addr).await?;
    info!("listening on {}", socket_addr);

    let mut shutdown = shutdown.clone();
    axum::serve(tcp, router)
        .with_graceful_shutdown(async move {
            if shutdown.changed().await.is_ok() {
                info!("Shutting down server...");
            }
        })
        .await?;
    Ok(())
}
