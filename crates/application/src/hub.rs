//! 进程内通知中心
//!
//! 维护连接与房间的双向索引：注册时自动加入个人房间
//! `user:<id>`，之后可按帖子房间 `post:<id>` 订阅/退订。
//! 投递为尽力而为，慢消费者或已断开的连接直接丢弃消息。

use domain::events::{user_room, NotificationEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(Uuid),
}

struct ConnectionEntry {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<NotificationEvent>,
    rooms: HashSet<String>,
}

/// 通知中心
///
/// 无消息留存：房间里没有连接时事件直接丢弃，断线重连不回放。
pub struct NotificationHub {
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
    rooms: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl NotificationHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
        })
    }

    /// 注册已认证连接，自动加入个人房间
    ///
    /// 返回连接标识和事件接收端。同一用户可持多个连接，各自独立收事件。
    pub async fn register(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<NotificationEvent>) {
        let conn_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        let personal = user_room(user_id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(
                conn_id,
                ConnectionEntry {
                    user_id,
                    sender,
                    rooms: HashSet::from([personal.clone()]),
                },
            );
        }
        {
            let mut rooms = self.rooms.write().await;
            rooms.entry(personal).or_default().insert(conn_id);
        }

        debug!(%conn_id, %user_id, "connection registered");
        (conn_id, receiver)
    }

    /// 注销连接并释放其全部房间成员资格
    ///
    /// 幂等：未知连接直接返回。
    pub async fn unregister(&self, conn_id: Uuid) {
        let entry = {
            let mut connections = self.connections.write().await;
            connections.remove(&conn_id)
        };
        let Some(entry) = entry else {
            return;
        };

        let mut rooms = self.rooms.write().await;
        for room in &entry.rooms {
            if let Some(members) = rooms.get_mut(room) {
                members.remove(&conn_id);
                if members.is_empty() {
                    rooms.remove(room);
                }
            }
        }
        debug!(%conn_id, user_id = %entry.user_id, "connection unregistered");
    }

    /// 加入房间，重复加入为幂等
    pub async fn join(&self, conn_id: Uuid, room: &str) -> Result<(), HubError> {
        {
            let mut connections = self.connections.write().await;
            let entry = connections
                .get_mut(&conn_id)
                .ok_or(HubError::ConnectionNotFound(conn_id))?;
            entry.rooms.insert(room.to_string());
        }
        let mut rooms = self.rooms.write().await;
        rooms.entry(room.to_string()).or_default().insert(conn_id);
        debug!(%conn_id, room, "joined room");
        Ok(())
    }

    /// 退出房间，未加入时退出为幂等
    pub async fn leave(&self, conn_id: Uuid, room: &str) -> Result<(), HubError> {
        {
            let mut connections = self.connections.write().await;
            let entry = connections
                .get_mut(&conn_id)
                .ok_or(HubError::ConnectionNotFound(conn_id))?;
            entry.rooms.remove(room);
        }
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
        debug!(%conn_id, room, "left room");
        Ok(())
    }

    /// 向房间内全部连接广播事件，返回成功投递数
    ///
    /// 发送端已关闭的连接跳过，由其任务自行注销。
    pub async fn notify(&self, room: &str, event: NotificationEvent) -> usize {
        let member_ids: Vec<Uuid> = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(members) => members.iter().copied().collect(),
                None => return 0,
            }
        };

        let connections = self.connections.read().await;
        let mut delivered = 0;
        for conn_id in member_ids {
            let Some(entry) = connections.get(&conn_id) else {
                continue;
            };
            if entry.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(%conn_id, room, "dropping event for closed connection");
            }
        }
        debug!(room, delivered, event = event.event_name(), "event broadcast");
        delivered
    }

    /// 当前在线连接数
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::entities::Comment;
    use domain::events::post_room;
    use serde_json::json;

    fn sample_event() -> NotificationEvent {
        NotificationEvent::UserNotification {
            payload: json!({"message": "hello"}),
        }
    }

    #[tokio::test]
    async fn test_register_auto_joins_personal_room() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let (_conn_id, mut receiver) = hub.register(user_id).await;

        let delivered = hub.notify(&user_room(user_id), sample_event()).await;
        assert_eq!(delivered, 1);
        assert!(receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_room_scoping() {
        let hub = NotificationHub::new();
        let post_a = Uuid::new_v4();
        let post_b = Uuid::new_v4();

        let (conn_a, mut recv_a) = hub.register(Uuid::new_v4()).await;
        let (conn_b, mut recv_b) = hub.register(Uuid::new_v4()).await;
        hub.join(conn_a, &post_room(post_a)).await.unwrap();
        hub.join(conn_b, &post_room(post_b)).await.unwrap();

        let comment =
            Comment::new(post_a, Uuid::new_v4(), "nice post", chrono::Utc::now()).unwrap();
        let delivered = hub
            .notify(&post_room(post_a), NotificationEvent::NewComment { comment })
            .await;

        // 只有 post_a 的订阅者收到
        assert_eq!(delivered, 1);
        assert!(recv_a.recv().await.is_some());
        assert!(recv_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_stops_delivery() {
        let hub = NotificationHub::new();
        let post_id = Uuid::new_v4();
        let (conn_id, mut receiver) = hub.register(Uuid::new_v4()).await;
        let room = post_room(post_id);

        hub.join(conn_id, &room).await.unwrap();
        hub.leave(conn_id, &room).await.unwrap();

        assert_eq!(hub.notify(&room, sample_event()).await, 0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_and_leave_are_idempotent() {
        let hub = NotificationHub::new();
        let post_id = Uuid::new_v4();
        let (conn_id, _receiver) = hub.register(Uuid::new_v4()).await;
        let room = post_room(post_id);

        hub.join(conn_id, &room).await.unwrap();
        hub.join(conn_id, &room).await.unwrap();
        assert_eq!(hub.notify(&room, sample_event()).await, 1);

        hub.leave(conn_id, &room).await.unwrap();
        hub.leave(conn_id, &room).await.unwrap();
        assert_eq!(hub.notify(&room, sample_event()).await, 0);
    }

    #[tokio::test]
    async fn test_join_unknown_connection_fails() {
        let hub = NotificationHub::new();
        let result = hub.join(Uuid::new_v4(), "post:whatever").await;
        assert!(matches!(result, Err(HubError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_unregister_releases_all_rooms() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let (conn_id, _receiver) = hub.register(user_id).await;
        hub.join(conn_id, &post_room(post_id)).await.unwrap();

        hub.unregister(conn_id).await;

        assert_eq!(hub.notify(&post_room(post_id), sample_event()).await, 0);
        assert_eq!(hub.notify(&user_room(user_id), sample_event()).await, 0);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_user_multiple_connections() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let (_c1, mut r1) = hub.register(user_id).await;
        let (_c2, mut r2) = hub.register(user_id).await;

        let delivered = hub.notify(&user_room(user_id), sample_event()).await;
        assert_eq!(delivered, 2);
        assert!(r1.recv().await.is_some());
        assert!(r2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_empty_room_drops_event() {
        let hub = NotificationHub::new();
        assert_eq!(hub.notify("post:nobody-here", sample_event()).await, 0);
    }
}
