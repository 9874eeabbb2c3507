//! UseCase: 外部サービスからのイベント配信
//!
//! Other services (task management, notifications) push domain events into a
//! tenant through this use case. Delivery is fire-and-forget: a tenant with no
//! connected members simply drops the event.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::domain::{EventPusher, MessageType, TaskAction, TenantId, UserId};

use super::error::PublishError;

/// イベント配信のユースケース
pub struct PublishEventUseCase {
    pusher: Arc<dyn EventPusher>,
}

impl PublishEventUseCase {
    pub fn new(pusher: Arc<dyn EventPusher>) -> Self {
        Self { pusher }
    }

    /// Broadcast a task lifecycle event to the whole tenant.
    ///
    /// Every action goes out as `task_update`; clients tell creations and
    /// deletions apart by `action` in the payload.
    pub async fn publish_task_event(&self, tenant_id: TenantId, action: TaskAction, task: Value) {
        let payload = json!({ "action": action.as_str(), "task": task });
        self.pusher
            .broadcast_to_tenant(tenant_id, MessageType::TaskUpdate, Some(payload))
            .await;
    }

    /// Send a notification to every connection of one user
    pub async fn notify_user(&self, tenant_id: TenantId, user_id: UserId, notification: Value) {
        let payload = json!({ "notification": notification });
        self.pusher
            .broadcast_to_user(tenant_id, user_id, MessageType::Notification, Some(payload))
            .await;
    }

    /// Publish an arbitrary event, to one user when `target` is set.
    ///
    /// # Errors
    ///
    /// * `PublishError::ReservedType` - presence events and heartbeats
    pub async fn publish(
        &self,
        tenant_id: TenantId,
        kind: MessageType,
        data: Option<Value>,
        target: Option<UserId>,
    ) -> Result<(), PublishError> {
        if matches!(
            kind,
            MessageType::UserJoined | MessageType::UserLeft | MessageType::Ping | MessageType::Pong
        ) {
            return Err(PublishError::ReservedType(kind));
        }

        match target {
            Some(user_id) => {
                self.pusher
                    .broadcast_to_user(tenant_id, user_id, kind, data)
                    .await
            }
            None => self.pusher.broadcast_to_tenant(tenant_id, kind, data).await,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockEventPusher;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_task_event_sends_task_update_with_action() {
        // テスト項目: 作成・更新・削除のいずれも task_update として配信され、アクションはペイロードに入る
        // given (前提条件):
        let tenant_id = TenantId::new(Uuid::new_v4());
        let mut pusher = MockEventPusher::new();
        for action in ["created", "updated", "deleted"] {
            pusher
                .expect_broadcast_to_tenant()
                .withf(move |t, kind, payload| {
                    *t == tenant_id
                        && *kind == MessageType::TaskUpdate
                        && payload.as_ref()
                            == Some(&json!({"action": action, "task": {"id": 42}}))
                })
                .times(1)
                .return_const(());
        }
        let usecase = PublishEventUseCase::new(Arc::new(pusher));

        // when (操作) / then (期待する結果):
        for action in [TaskAction::Created, TaskAction::Updated, TaskAction::Deleted] {
            usecase
                .publish_task_event(tenant_id, action, json!({"id": 42}))
                .await;
        }
    }

    #[tokio::test]
    async fn test_notify_user_targets_single_user() {
        // テスト項目: 通知は指定ユーザーにのみ送られる
        // given (前提条件):
        let tenant_id = TenantId::new(Uuid::new_v4());
        let user_id = UserId::new(Uuid::new_v4());
        let mut pusher = MockEventPusher::new();
        pusher.expect_broadcast_to_tenant().never();
        pusher
            .expect_broadcast_to_user()
            .withf(move |t, u, kind, payload| {
                *t == tenant_id
                    && *u == user_id
                    && *kind == MessageType::Notification
                    && payload.as_ref() == Some(&json!({"notification": {"text": "hi"}}))
            })
            .times(1)
            .return_const(());
        let usecase = PublishEventUseCase::new(Arc::new(pusher));

        // when (操作) / then (期待する結果):
        usecase
            .notify_user(tenant_id, user_id, json!({"text": "hi"}))
            .await;
    }

    #[tokio::test]
    async fn test_publish_routes_by_target() {
        // テスト項目: 宛先ユーザーの有無でテナント配信と個別配信が切り替わる
        // given (前提条件):
        let tenant_id = TenantId::new(Uuid::new_v4());
        let user_id = UserId::new(Uuid::new_v4());
        let mut pusher = MockEventPusher::new();
        pusher
            .expect_broadcast_to_tenant()
            .withf(|_, kind, _| *kind == MessageType::TaskUpdate)
            .times(1)
            .return_const(());
        pusher
            .expect_broadcast_to_user()
            .withf(move |_, u, kind, _| *u == user_id && *kind == MessageType::Notification)
            .times(1)
            .return_const(());
        let usecase = PublishEventUseCase::new(Arc::new(pusher));

        // when (操作):
        let to_tenant = usecase
            .publish(tenant_id, MessageType::TaskUpdate, None, None)
            .await;
        let to_user = usecase
            .publish(tenant_id, MessageType::Notification, None, Some(user_id))
            .await;

        // then (期待する結果):
        assert_eq!(to_tenant, Ok(()));
        assert_eq!(to_user, Ok(()));
    }

    #[tokio::test]
    async fn test_publish_rejects_reserved_types() {
        // テスト項目: プレゼンス・ハートビートの type は外部から配信できない
        // given (前提条件):
        let mut pusher = MockEventPusher::new();
        pusher.expect_broadcast_to_tenant().never();
        pusher.expect_broadcast_to_user().never();
        let usecase = PublishEventUseCase::new(Arc::new(pusher));
        let tenant_id = TenantId::new(Uuid::new_v4());

        // when (操作):
        let result = usecase
            .publish(tenant_id, MessageType::UserJoined, None, None)
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(PublishError::ReservedType(MessageType::UserJoined))
        );
    }
}
