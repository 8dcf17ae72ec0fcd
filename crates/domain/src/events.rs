//! 实时通知事件定义
//!
//! 事件是"即发即弃"的：不持久化、不确认送达、离线连接不补发。

use crate::entities::{Comment, Post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 生成文章主题房间名（`post:<id>`）
pub fn post_room(post_id: Uuid) -> String {
    format!("post:{}", post_id)
}

/// 生成用户私有房间名（`user:<id>`）
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// 实时通知事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// 文章收到新评论
    NewComment { comment: Comment },
    /// 文章被更新
    PostUpdated { post: Post },
    /// 发送给单个用户的通知
    UserNotification { payload: serde_json::Value },
}

impl NotificationEvent {
    /// 事件的线上名称，与客户端协议保持一致
    pub fn event_name(&self) -> &'static str {
        match self {
            NotificationEvent::NewComment { .. } => "new:comment",
            NotificationEvent::PostUpdated { .. } => "update:post",
            NotificationEvent::UserNotification { .. } => "notification",
        }
    }

    /// 事件携带的数据部分
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            NotificationEvent::NewComment { comment } => serde_json::to_value(comment),
            NotificationEvent::PostUpdated { post } => serde_json::to_value(post),
            NotificationEvent::UserNotification { payload } => Ok(payload.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_room_names() {
        let id = Uuid::nil();
        assert_eq!(post_room(id), format!("post:{}", id));
        assert_eq!(user_room(id), format!("user:{}", id));
    }

    #[test]
    fn test_event_names() {
        let comment = Comment::new(Uuid::new_v4(), Uuid::new_v4(), "hi", Utc::now()).unwrap();
        let event = NotificationEvent::NewComment { comment };
        assert_eq!(event.event_name(), "new:comment");
        assert!(event.data().is_ok());
    }
}
