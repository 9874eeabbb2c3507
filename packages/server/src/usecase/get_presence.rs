//! UseCase: テナントのプレゼンス取得
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - GetPresenceUseCase::execute() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：複数ユーザー・複数接続のテナント
//! - エッジケース：ルームが存在しないテナント（空のスナップショット）

use std::sync::Arc;

use crate::domain::{ConnectionInfo, PresenceRepository, TenantId, UserId};

/// Presence of one tenant at the time of the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub tenant_id: TenantId,
    /// Sorted, one entry per user
    pub online_users: Vec<UserId>,
    pub client_count: usize,
    /// Oldest connection first
    pub connections: Vec<ConnectionInfo>,
}

impl PresenceSnapshot {
    pub fn user_count(&self) -> usize {
        self.online_users.len()
    }
}

/// プレゼンス取得のユースケース
pub struct GetPresenceUseCase {
    repository: Arc<dyn PresenceRepository>,
}

impl GetPresenceUseCase {
    pub fn new(repository: Arc<dyn PresenceRepository>) -> Self {
        Self { repository }
    }

    /// Collect the presence snapshot of `tenant_id`.
    ///
    /// The three reads are not atomic with each other; a connection arriving
    /// in between can show up in one list and not another.
    pub async fn execute(&self, tenant_id: TenantId) -> PresenceSnapshot {
        let mut online_users = self.repository.online_users(tenant_id).await;
        online_users.sort();

        let client_count = self.repository.client_count(tenant_id).await;

        let mut connections = self.repository.connections(tenant_id).await;
        connections.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.user_name.cmp(&b.user_name))
        });

        PresenceSnapshot {
            tenant_id,
            online_users,
            client_count,
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockPresenceRepository;
    use uuid::Uuid;

    fn info(user_id: UserId, user_name: &str, connected_at: i64) -> ConnectionInfo {
        ConnectionInfo {
            user_id,
            user_name: user_name.to_string(),
            role: "member".to_string(),
            connected_at,
        }
    }

    #[tokio::test]
    async fn test_execute_collects_sorted_snapshot() {
        // テスト項目: オンラインユーザー・接続数・接続一覧がまとめて返される
        // given (前提条件):
        let tenant_id = TenantId::new(Uuid::new_v4());
        let alice = UserId::new(Uuid::new_v4());
        let bob = UserId::new(Uuid::new_v4());

        let mut repository = MockPresenceRepository::new();
        repository
            .expect_online_users()
            .withf(move |t| *t == tenant_id)
            .times(1)
            .returning(move |_| vec![bob, alice]);
        repository
            .expect_client_count()
            .times(1)
            .returning(|_| 3);
        repository
            .expect_connections()
            .times(1)
            .returning(move |_| {
                vec![
                    info(bob, "Bob", 20),
                    info(alice, "Alice", 30),
                    info(alice, "Alice", 10),
                ]
            });
        let usecase = GetPresenceUseCase::new(Arc::new(repository));

        // when (操作):
        let snapshot = usecase.execute(tenant_id).await;

        // then (期待する結果):
        let mut expected_users = vec![alice, bob];
        expected_users.sort();
        assert_eq!(snapshot.tenant_id, tenant_id);
        assert_eq!(snapshot.online_users, expected_users);
        assert_eq!(snapshot.user_count(), 2);
        assert_eq!(snapshot.client_count, 3);
        let order: Vec<i64> = snapshot.connections.iter().map(|c| c.connected_at).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_execute_for_unknown_tenant_is_empty() {
        // テスト項目: ルームが存在しないテナントは空のスナップショットになる
        // given (前提条件):
        let mut repository = MockPresenceRepository::new();
        repository.expect_online_users().returning(|_| Vec::new());
        repository.expect_client_count().returning(|_| 0);
        repository.expect_connections().returning(|_| Vec::new());
        let usecase = GetPresenceUseCase::new(Arc::new(repository));

        // when (操作):
        let snapshot = usecase.execute(TenantId::new(Uuid::new_v4())).await;

        // then (期待する結果):
        assert!(snapshot.online_users.is_empty());
        assert_eq!(snapshot.user_count(), 0);
        assert_eq!(snapshot.client_count, 0);
        assert!(snapshot.connections.is_empty());
    }
}
