//! Reminder HTTP surface — CRUD plus the on-demand sweep trigger.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::{can_edit_reminder, can_view_reminder, Identity};
use crate::error::ApiError;
use crate::reminders::dispatcher::{Dispatcher, SweepGate};
use crate::reminders::model::{NewReminder, Reminder, ReminderUpdate};
use crate::store::Database;

#[derive(Clone)]
struct ReminderState {
    store: Arc<dyn Database>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<SweepGate>,
    sweep_limit: usize,
}

pub fn reminder_routes(
    store: Arc<dyn Database>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<SweepGate>,
    sweep_limit: usize,
) -> Router {
    Router::new()
        .route("/api/reminders", post(create).get(list))
        .route(
            "/api/reminders/{id}",
            get(fetch).patch(update).delete(soft_delete),
        )
        .route("/api/reminders/{id}/restore", post(restore))
        .route("/api/reminders/sweep", post(trigger_sweep))
        .with_state(ReminderState {
            store,
            dispatcher,
            gate,
            sweep_limit,
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    ok: bool,
    found: usize,
    attempted: usize,
    sent: usize,
    failed: usize,
}

async fn create(
    State(state): State<ReminderState>,
    identity: Identity,
    Json(body): Json<NewReminder>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = Reminder::new(body, identity.user_id, identity.role);
    reminder.validate()?;
    state.store.insert_reminder(&reminder).await?;
    info!(reminder_id = %reminder.id, creator = %identity.user_id, "Reminder created");
    Ok(Json(reminder))
}

/// Listing is filtered per role: owners see everything, employees see their
/// own plus client-directed reminders, clients see only their own.
async fn list(
    State(state): State<ReminderState>,
    identity: Identity,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    let all = state.store.list_reminders(params.include_deleted).await?;
    let visible = all
        .into_iter()
        .filter(|r| can_view_reminder(&identity, r))
        .collect();
    Ok(Json(visible))
}

async fn fetch(
    State(state): State<ReminderState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = state
        .store
        .get_reminder(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "reminder",
            id: id.to_string(),
        })?;
    if !can_view_reminder(&identity, &reminder) {
        return Err(ApiError::Authorization(
            "Not allowed to view this reminder".into(),
        ));
    }
    Ok(Json(reminder))
}

async fn update(
    State(state): State<ReminderState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<ReminderUpdate>,
) -> Result<Json<Reminder>, ApiError> {
    let mut reminder = state
        .store
        .get_reminder(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "reminder",
            id: id.to_string(),
        })?;
    if !can_edit_reminder(&identity, &reminder) {
        return Err(ApiError::Authorization(
            "Not allowed to edit this reminder".into(),
        ));
    }
    reminder.apply(body, identity.user_id, Utc::now());
    reminder.validate()?;
    state.store.update_reminder(&reminder).await?;
    Ok(Json(reminder))
}

async fn soft_delete(
    State(state): State<ReminderState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reminder = state
        .store
        .get_reminder(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "reminder",
            id: id.to_string(),
        })?;
    if !can_edit_reminder(&identity, &reminder) {
        return Err(ApiError::Authorization(
            "Not allowed to delete this reminder".into(),
        ));
    }
    state.store.set_reminder_deleted(id, true).await?;
    info!(reminder_id = %id, "Reminder soft-deleted");
    Ok(Json(json!({ "ok": true })))
}

async fn restore(
    State(state): State<ReminderState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Reminder>, ApiError> {
    let reminder = state
        .store
        .get_reminder(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "reminder",
            id: id.to_string(),
        })?;
    if !can_edit_reminder(&identity, &reminder) {
        return Err(ApiError::Authorization(
            "Not allowed to restore this reminder".into(),
        ));
    }
    state.store.set_reminder_deleted(id, false).await?;
    let restored = state
        .store
        .get_reminder(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "reminder",
            id: id.to_string(),
        })?;
    Ok(Json(restored))
}

/// Manual sweep trigger, staff only, spaced by the process-wide gate.
/// A refused trigger mutates nothing and reports when to retry.
async fn trigger_sweep(
    State(state): State<ReminderState>,
    identity: Identity,
) -> Result<Json<SweepResponse>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization(
            "Only staff can trigger a sweep".into(),
        ));
    }
    if let Err(retry_after_secs) = state.gate.try_acquire().await {
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    let summary = state
        .dispatcher
        .run_due_sweep(Utc::now(), state.sweep_limit)
        .await?;
    Ok(Json(SweepResponse {
        ok: true,
        found: summary.found,
        attempted: summary.attempted,
        sent: summary.sent,
        failed: summary.failed,
    }))
}
