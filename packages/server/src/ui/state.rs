//! Shared application state.

use std::sync::Arc;

use crate::{
    config::ConnectionConfig,
    infrastructure::hub::Hub,
    usecase::{GetPresenceUseCase, PublishEventUseCase},
};

pub struct AppState {
    pub hub: Hub,
    /// Timeouts and limits applied to every WebSocket connection
    pub connection_config: ConnectionConfig,
    /// GetPresenceUseCase（プレゼンス取得のユースケース）
    pub get_presence_usecase: Arc<GetPresenceUseCase>,
    /// PublishEventUseCase（イベント配信のユースケース）
    pub publish_event_usecase: Arc<PublishEventUseCase>,
}
