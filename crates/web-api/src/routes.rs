use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use application::{
    AddCommentRequest, CreatePostRequest, DataSource, UpdatePostRequest,
};

use crate::{error::ApiError, rate_limit, state::AppState, ws_connection};

#[derive(Debug, Deserialize, Validate)]
struct CreatePostPayload {
    #[validate(length(min = 1, max = 255))]
    title: String,
    #[validate(length(min = 1))]
    content: String,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdatePostPayload {
    #[validate(length(min = 1, max = 255))]
    title: String,
    #[validate(length(min = 1))]
    content: String,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct AddCommentPayload {
    #[validate(length(min = 1))]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{post_id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{post_id}/comments", post(add_comment))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .route("/ws", get(ws_connection::websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 成功响应信封，读接口额外带数据来源标记
fn success<T: Serialize>(data: &T, source: Option<DataSource>) -> Json<Value> {
    let mut body = json!({
        "status": "success",
        "data": data,
    });
    if let Some(source) = source {
        body["source"] = json!(source);
    }
    Json(body)
}

fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload
        .validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let (listing, source) = state.post_service.get_posts(page, limit).await?;
    Ok(success(&listing, Some(source)))
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let author_id = state.jwt_service.extract_user_from_headers(&headers)?;
    validate_payload(&payload)?;

    let post = state
        .post_service
        .create_post(
            author_id,
            CreatePostRequest {
                title: payload.title,
                content: payload.content,
                published: payload.published,
                tags: payload.tags,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, success(&post, None)))
}

async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let (detail, source) = state.post_service.get_post(post_id).await?;
    Ok(success(&detail, Some(source)))
}

async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePostPayload>,
) -> Result<Json<Value>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    validate_payload(&payload)?;

    let post = state
        .post_service
        .update_post(
            post_id,
            user_id,
            UpdatePostRequest {
                title: payload.title,
                content: payload.content,
                published: payload.published,
                tags: payload.tags,
            },
        )
        .await?;

    Ok(success(&post, None))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    state.post_service.delete_post(post_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<AddCommentPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let author_id = state.jwt_service.extract_user_from_headers(&headers)?;
    validate_payload(&payload)?;

    let comment = state
        .post_service
        .add_comment(
            post_id,
            author_id,
            AddCommentRequest {
                content: payload.content,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, success(&comment, None)))
}
