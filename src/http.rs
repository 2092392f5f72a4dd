use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::DEFAULT_CLIENT_ORIGIN;
use crate::error::ApiError;
use crate::files::FileStore;
use crate::message::{validate_sender, validate_text, NewMessage};
use crate::relay::broadcast_message;
use crate::store::MessageStore;
use crate::AppState;

/// Build the HTTP surface: history, the two creation endpoints, and static
/// serving of uploaded files.
pub fn router(state: Arc<AppState>) -> Router {
    // The origin was validated at config load time
    let origin = state
        .config
        .client_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CLIENT_ORIGIN));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/messages", get(list_messages).post(create_text_message))
        .route("/messages/upload", post(upload_file))
        .nest_service("/files", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /messages: full history, oldest first.
async fn list_messages(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.store.find_all().await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
struct CreateMessage {
    #[serde(default)]
    body: Option<String>,
    #[serde(default, rename = "from")]
    from: Option<String>,
}

/// POST /messages: create a text message. Unlike the socket path, invalid
/// input is rejected with a 400 rather than dropped.
async fn create_text_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.unwrap_or_default();
    let from = req.from.unwrap_or_default();
    validate_text(&body, &from)?;

    let message = state.store.save(NewMessage::text(body.trim(), from)).await?;
    broadcast_message(&state.registry, &message);
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /messages/upload: multipart fields `file` and `from`. The blob is
/// stored before the message is persisted, so a failed upload never leaves a
/// message pointing at a file that was not written.
async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, bytes::Bytes)> = None;
    let mut from: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await?;
                file = Some((file_name, data));
            }
            "from" => from = Some(field.text().await?),
            _ => {}
        }
    }

    let from = from.unwrap_or_default();
    validate_sender(&from)?;
    let (file_name, data) = file.ok_or(ApiError::MissingFile)?;

    let file_url = state.files.store(data, &file_name).await?;
    let message = state
        .store
        .save(NewMessage::file(file_url, file_name.clone(), from))
        .await?;
    broadcast_message(&state.registry, &message);
    info!("stored file message {} ({})", message.id, file_name);
    Ok((StatusCode::CREATED, Json(message)))
}
