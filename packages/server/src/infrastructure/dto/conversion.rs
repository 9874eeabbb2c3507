//! Conversion logic between DTOs and domain types.

use hiroba_shared::time::unix_secs_to_rfc3339;

use crate::domain::{ConnectionInfo, Message};
use crate::infrastructure::dto::{http::ConnectionDto, websocket::WireMessage};

// ========================================
// Domain → DTO
// ========================================

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            r#type: message.kind(),
            data: message.payload().cloned(),
            user_id: message.origin_user_id(),
            tenant_id: message.tenant_id(),
            timestamp: message.timestamp(),
            message_id: message.message_id().clone(),
            meta: message.meta().cloned(),
        }
    }
}

impl From<ConnectionInfo> for ConnectionDto {
    fn from(info: ConnectionInfo) -> Self {
        Self {
            user_id: info.user_id,
            user_name: info.user_name,
            role: info.role,
            connected_at: unix_secs_to_rfc3339(info.connected_at),
        }
    }
}

/// Serialize a message into one text frame
pub fn encode_frame(message: &Message) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WireMessage::from(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageType, TenantId, UserId};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_encode_frame_uses_wire_field_names() {
        // テスト項目: フレームがワイヤ形式のフィールド名で JSON 化される
        // given (前提条件):
        let tenant_id = TenantId::new(Uuid::new_v4());
        let user_id = UserId::new(Uuid::new_v4());
        let message = Message::new(MessageType::TaskUpdate, tenant_id, 1_700_000_000)
            .with_origin(user_id)
            .with_payload(json!({"task": 1}));

        // when (操作):
        let frame = encode_frame(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "task_update");
        assert_eq!(value["data"], json!({"task": 1}));
        assert_eq!(value["user_id"], user_id.to_string());
        assert_eq!(value["tenant_id"], tenant_id.to_string());
        assert_eq!(value["timestamp"], 1_700_000_000);
        assert_eq!(value["message_id"], message.message_id().as_str());
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_system_broadcast_omits_user_id() {
        // テスト項目: 送信元ユーザーのないメッセージは user_id を含まない
        // given (前提条件):
        let message = Message::new(
            MessageType::Notification,
            TenantId::new(Uuid::new_v4()),
            1,
        );

        // when (操作):
        let frame = encode_frame(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        // then (期待する結果):
        assert!(value.get("user_id").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_connection_info_to_dto() {
        // テスト項目: 接続情報が RFC 3339 の接続時刻付き DTO に変換される
        // given (前提条件):
        let info = ConnectionInfo {
            user_id: UserId::new(Uuid::new_v4()),
            user_name: "Alice".to_string(),
            role: "admin".to_string(),
            connected_at: 1_672_531_200,
        };

        // when (操作):
        let dto: ConnectionDto = info.clone().into();

        // then (期待する結果):
        assert_eq!(dto.user_id, info.user_id);
        assert_eq!(dto.user_name, "Alice");
        assert_eq!(dto.role, "admin");
        assert_eq!(dto.connected_at.as_deref(), Some("2023-01-01T00:00:00Z"));
    }
}
