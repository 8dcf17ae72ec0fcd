//! WebSocket 通知连接
//!
//! 连接生命周期：Connecting（升级请求到达）→ Authenticated（token
//! 验证通过并注册到通知中心）→ Disconnected（任一方关闭）。token
//! 无效时在升级前拒绝（Rejected），不会留下任何通知中心状态。

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use domain::events::{post_room, NotificationEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// 客户端帧
///
/// `{"event": "subscribe:posts", "post_id": "..."}` 订阅文章房间，
/// `unsubscribe:posts` 退订。其余帧忽略。
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum ClientFrame {
    #[serde(rename = "subscribe:posts")]
    Subscribe { post_id: Uuid },
    #[serde(rename = "unsubscribe:posts")]
    Unsubscribe { post_id: Uuid },
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // 升级前验证凭证，握手失败不产生任何连接状态
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("Missing token"))?;
    let claims = state.jwt_service.verify_token(&token)?;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, claims.user_id)))
}

async fn run_connection(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (conn_id, mut events) = state.hub.register(user_id).await;
    tracing::info!(%conn_id, %user_id, "websocket connection established");

    let (mut sender, mut incoming) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(frame) = serialize_event(&event) else { continue };
                if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_frame(&state, conn_id, text.as_str()).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {} // ping/pong 由协议层处理
                }
            }
        }
    }

    state.hub.unregister(conn_id).await;
    tracing::info!(%conn_id, %user_id, "websocket connection closed");
}

/// 服务端帧统一为 `{"event": "...", "data": ...}`
fn serialize_event(event: &NotificationEvent) -> Option<String> {
    let data = match event.data() {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize notification event");
            return None;
        }
    };
    Some(
        json!({
            "event": event.event_name(),
            "data": data,
        })
        .to_string(),
    )
}

async fn handle_client_frame(state: &AppState, conn_id: Uuid, text: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::debug!(%conn_id, error = %err, "ignoring malformed client frame");
            return;
        }
    };

    let result = match frame {
        ClientFrame::Subscribe { post_id } => {
            state.hub.join(conn_id, &post_room(post_id)).await
        }
        ClientFrame::Unsubscribe { post_id } => {
            state.hub.leave(conn_id, &post_room(post_id)).await
        }
    };

    if let Err(err) = result {
        tracing::warn!(%conn_id, error = %err, "room operation failed");
    }
}
