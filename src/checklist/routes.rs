//! Checklist HTTP surface.
//!
//! Items are strictly creator-scoped: every read and write applies to the
//! caller's own items only. Listings come back priority-ranked.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::{can_touch_checklist_item, Identity};
use crate::checklist::model::{Category, ChecklistItem, Subcategory};
use crate::checklist::rank;
use crate::error::ApiError;
use crate::store::Database;

#[derive(Clone)]
struct ChecklistState {
    store: Arc<dyn Database>,
}

pub fn checklist_routes(store: Arc<dyn Database>) -> Router {
    Router::new()
        .route("/api/checklist", post(create).get(list))
        .route(
            "/api/checklist/{id}",
            axum::routing::patch(update).delete(soft_delete),
        )
        .route("/api/checklist/{id}/complete", post(set_complete))
        .route("/api/checklist/{id}/restore", post(restore))
        .with_state(ChecklistState { store })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewChecklistItem {
    text: String,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
    category: Category,
    subcategory: Subcategory,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistUpdate {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    subcategory: Option<Subcategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    completed: bool,
}

async fn create(
    State(state): State<ChecklistState>,
    identity: Identity,
    Json(body): Json<NewChecklistItem>,
) -> Result<Json<ChecklistItem>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::Validation("text is required".into()));
    }
    let item = ChecklistItem::new(
        identity.user_id,
        body.text,
        body.deadline,
        body.category,
        body.subcategory,
    );
    state.store.insert_checklist_item(&item).await?;
    info!(item_id = %item.id, creator = %identity.user_id, "Checklist item created");
    Ok(Json(item))
}

/// The caller's items, priority-ranked.
async fn list(
    State(state): State<ChecklistState>,
    identity: Identity,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ChecklistItem>>, ApiError> {
    let items = state
        .store
        .list_checklist_items(identity.user_id, params.include_deleted)
        .await?;
    Ok(Json(rank::rank(&items)))
}

async fn load_owned(
    state: &ChecklistState,
    identity: &Identity,
    id: Uuid,
) -> Result<ChecklistItem, ApiError> {
    let item = state
        .store
        .get_checklist_item(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "checklist_item",
            id: id.to_string(),
        })?;
    if !can_touch_checklist_item(identity, &item) {
        return Err(ApiError::Authorization(
            "Not allowed to modify this checklist item".into(),
        ));
    }
    Ok(item)
}

async fn update(
    State(state): State<ChecklistState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<ChecklistUpdate>,
) -> Result<Json<ChecklistItem>, ApiError> {
    let mut item = load_owned(&state, &identity, id).await?;
    if let Some(text) = body.text {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("text cannot be empty".into()));
        }
        item.text = text;
    }
    if let Some(deadline) = body.deadline {
        item.deadline = Some(deadline);
    }
    if let Some(category) = body.category {
        item.category = category;
    }
    if let Some(subcategory) = body.subcategory {
        item.subcategory = subcategory;
    }
    item.updated_at = Utc::now();
    state.store.update_checklist_item(&item).await?;
    Ok(Json(item))
}

async fn set_complete(
    State(state): State<ChecklistState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<ChecklistItem>, ApiError> {
    let mut item = load_owned(&state, &identity, id).await?;
    item.set_completed(body.completed, Utc::now());
    state.store.update_checklist_item(&item).await?;
    Ok(Json(item))
}

async fn soft_delete(
    State(state): State<ChecklistState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut item = load_owned(&state, &identity, id).await?;
    item.deleted = true;
    item.updated_at = Utc::now();
    state.store.update_checklist_item(&item).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn restore(
    State(state): State<ChecklistState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ChecklistItem>, ApiError> {
    let mut item = load_owned(&state, &identity, id).await?;
    item.deleted = false;
    item.updated_at = Utc::now();
    state.store.update_checklist_item(&item).await?;
    Ok(Json(item))
}
