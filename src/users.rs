//! Minimal persisted user records.
//!
//! Authentication lives upstream; these rows exist so references
//! (message senders, conversation clients, assignees) resolve to names.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::ApiError;
use crate::store::Database;

/// A portal user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Clone)]
struct UserState {
    store: Arc<dyn Database>,
}

/// Build user routes.
pub fn user_routes(store: Arc<dyn Database>) -> Router {
    Router::new()
        .route("/api/users", post(register).get(list))
        .route("/api/users/me", get(me))
        .with_state(UserState { store })
}

async fn register(
    State(state): State<UserState>,
    identity: Identity,
    Json(body): Json<RegisterUser>,
) -> Result<Json<UserRecord>, ApiError> {
    if identity.role != Role::Owner {
        return Err(ApiError::Authorization(
            "only the owner may register users".into(),
        ));
    }
    if !crate::mailer::is_valid_email(&body.email) {
        return Err(ApiError::Validation(format!(
            "invalid email address: {}",
            body.email
        )));
    }
    let user = UserRecord {
        id: Uuid::new_v4(),
        name: body.name,
        email: body.email,
        role: body.role,
        created_at: Utc::now(),
    };
    state.store.upsert_user(&user).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, "User registered");
    Ok(Json(user))
}

async fn list(
    State(state): State<UserState>,
    identity: Identity,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    if !identity.role.is_staff() {
        return Err(ApiError::Authorization("staff only".into()));
    }
    Ok(Json(state.store.list_users().await?))
}

async fn me(
    State(state): State<UserState>,
    identity: Identity,
) -> Result<Json<UserRecord>, ApiError> {
    state
        .store
        .get_user(identity.user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound {
            entity: "user",
            id: identity.user_id.to_string(),
        })
}
