//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    domain::{TenantId, UserId},
    infrastructure::dto::http::{
        ConnectionDto, NotificationRequest, PresenceDto, PublishEventRequest, TaskEventRequest,
    },
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Presence snapshot of a tenant. Unknown tenants are reported as empty.
pub async fn get_presence(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
) -> Json<PresenceDto> {
    let snapshot = state.get_presence_usecase.execute(tenant_id).await;

    // Domain Model から DTO への変換
    let user_count = snapshot.user_count();
    Json(PresenceDto {
        tenant_id: snapshot.tenant_id.to_string(),
        online_users: snapshot.online_users,
        client_count: snapshot.client_count,
        user_count,
        connections: snapshot
            .connections
            .into_iter()
            .map(ConnectionDto::from)
            .collect(),
    })
}

/// Push an event into a tenant, or to one user when `user_id` is given.
///
/// Accepted means queued; delivery is best-effort.
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
    Json(request): Json<PublishEventRequest>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    match state
        .publish_event_usecase
        .publish(tenant_id, request.r#type, request.data, request.user_id)
        .await
    {
        Ok(()) => {
            tracing::debug!(
                tenant_id = %tenant_id,
                message_type = %request.r#type,
                "Event accepted"
            );
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => {
            tracing::warn!(tenant_id = %tenant_id, "Rejected event: {}", e);
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Broadcast a task lifecycle event to the tenant
pub async fn publish_task_event(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
    Json(request): Json<TaskEventRequest>,
) -> StatusCode {
    state
        .publish_event_usecase
        .publish_task_event(tenant_id, request.action, request.task)
        .await;
    StatusCode::ACCEPTED
}

/// Send a notification to every connection of one user
pub async fn notify_user(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, user_id)): Path<(TenantId, UserId)>,
    Json(request): Json<NotificationRequest>,
) -> StatusCode {
    state
        .publish_event_usecase
        .notify_user(tenant_id, user_id, request.notification)
        .await;
    StatusCode::ACCEPTED
}
