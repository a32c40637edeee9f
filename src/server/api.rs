use axum::{
    Json,
    Router,
    body::Body,
    extract::{ State, rejection::JsonRejection },
    http::{ StatusCode, header::CONTENT_TYPE },
    response::{ IntoResponse, Response },
    routing::{ get, post },
};
use log::{ info, warn, error };
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::api::{ ErrorResponse, HistoryResponse, ReplyRequest, ReplyResponse, StatusResponse };
use crate::relay::{ validate_text, Relay };
use crate::sentiment::detect_sentiment;

pub const STATUS_MESSAGE: &str = "Chatbot backend is running";

#[derive(Clone)]
struct AppState {
    relay: Relay,
}

pub fn router(relay: Relay) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_handler))
        .route("/reply", post(reply_handler))
        .route("/history", get(history_handler).delete(reset_history_handler))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(AppState { relay })
}

async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse { message: STATUS_MESSAGE.to_string() })
}

async fn reply_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReplyRequest>, JsonRejection>
) -> Result<Response, RelayError> {
    let Json(req) = payload.map_err(|e| RelayError::Validation(e.body_text()))?;
    let text = validate_text(req.text)?;

    let request_id = Uuid::new_v4();
    let sentiment = detect_sentiment(&text);
    info!("[{}] /reply stream={} sentiment={:?} ({} chars)", request_id, req.stream, sentiment, text.len());

    if req.stream {
        let fragments = state.relay.reply_stream(&text).await?;
        info!("[{}] streaming reply", request_id);
        return Ok(
            (
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(fragments),
            ).into_response()
        );
    }

    let reply = state.relay.reply(&text).await?;
    info!("[{}] reply sent ({} chars)", request_id, reply.len());
    Ok(Json(ReplyResponse { reply, sentiment }).into_response())
}

async fn history_handler(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse { turns: state.relay.history().snapshot().await })
}

async fn reset_history_handler(State(state): State<AppState>) -> StatusCode {
    let removed = state.relay.history().clear().await;
    info!("Conversation history reset ({} turns removed)", removed);
    StatusCode::NO_CONTENT
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            | RelayError::Upstream { .. }
            | RelayError::Transport(_)
            | RelayError::Decode(_)
            | RelayError::StreamInterrupted => StatusCode::BAD_GATEWAY,
            RelayError::Configuration(_) | RelayError::Serve(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            upstream_status: self.upstream_status(),
            detail: match &self {
                RelayError::Upstream { body, .. } => Some(body.clone()),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}
