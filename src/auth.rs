//! Trusted identity and authorization rules.
//!
//! The portal never authenticates directly — an upstream proxy verifies the
//! session and forwards the resolved identity in `x-user-id` / `x-user-role`
//! headers. This module extracts that identity and holds the per-entity
//! authorization predicates consumed as preconditions by the route handlers.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checklist::model::ChecklistItem;
use crate::reminders::model::Reminder;

/// Role of an authenticated portal user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Employee,
    Owner,
}

impl Role {
    /// Employees and owners are "staff" for conversation purposes.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Employee | Role::Owner)
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "employee" => Ok(Role::Employee),
            "owner" => Ok(Role::Owner),
            _ => Err(()),
        }
    }
}

/// A resolved, already-trusted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid x-user-id"))?;

        let role: Role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid x-user-role"))?;

        Ok(Identity { user_id, role })
    }
}

// ── Authorization predicates ────────────────────────────────────────

/// A client sees only reminders they created. An employee sees their own plus
/// any flagged `for_client`. An owner sees all.
pub fn can_view_reminder(identity: &Identity, reminder: &Reminder) -> bool {
    match identity.role {
        Role::Owner => true,
        Role::Employee => reminder.creator_id == identity.user_id || reminder.for_client,
        Role::Client => reminder.creator_id == identity.user_id,
    }
}

/// Only the owner role may act on reminders they didn't create.
pub fn can_edit_reminder(identity: &Identity, reminder: &Reminder) -> bool {
    identity.role == Role::Owner || reminder.creator_id == identity.user_id
}

/// Checklist items are strictly owner-of-record; even the owner role does not
/// override.
pub fn can_touch_checklist_item(identity: &Identity, item: &ChecklistItem) -> bool {
    item.creator_id == identity.user_id
}

/// Only staff may list all conversations, assign/unassign, or mark seen across
/// clients; a client may only interact with their own conversation.
pub fn can_access_conversation(identity: &Identity, client_id: Uuid) -> bool {
    identity.role.is_staff() || identity.user_id == client_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::model::{Category, Subcategory};
    use crate::reminders::model::NewReminder;

    fn ident(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    fn reminder_by(creator: Uuid, for_client: bool) -> Reminder {
        let mut r = Reminder::new(NewReminder {
            title: "t".into(),
            message: "m".into(),
            scheduled_time: chrono::Utc::now(),
            send_email: false,
            target_email: None,
            email_subject: None,
            email_body: None,
            for_client,
            category: None,
            subcategory: None,
        }, creator, Role::Client);
        r.for_client = for_client;
        r
    }

    #[test]
    fn owner_sees_and_edits_everything() {
        let owner = ident(Role::Owner);
        let r = reminder_by(Uuid::new_v4(), false);
        assert!(can_view_reminder(&owner, &r));
        assert!(can_edit_reminder(&owner, &r));
    }

    #[test]
    fn client_sees_only_own() {
        let client = ident(Role::Client);
        let own = reminder_by(client.user_id, false);
        let other = reminder_by(Uuid::new_v4(), true);
        assert!(can_view_reminder(&client, &own));
        assert!(!can_view_reminder(&client, &other));
    }

    #[test]
    fn employee_sees_own_plus_for_client() {
        let emp = ident(Role::Employee);
        let other_for_client = reminder_by(Uuid::new_v4(), true);
        let other_private = reminder_by(Uuid::new_v4(), false);
        assert!(can_view_reminder(&emp, &other_for_client));
        assert!(!can_view_reminder(&emp, &other_private));
        // seeing is not editing
        assert!(!can_edit_reminder(&emp, &other_for_client));
    }

    #[test]
    fn checklist_owner_role_does_not_override() {
        let owner = ident(Role::Owner);
        let item = ChecklistItem::new(
            Uuid::new_v4(),
            "call back",
            None,
            Category::Life,
            Subcategory::NoPay,
        );
        assert!(!can_touch_checklist_item(&owner, &item));
    }

    #[test]
    fn conversation_access_rules() {
        let client = ident(Role::Client);
        let emp = ident(Role::Employee);
        assert!(can_access_conversation(&client, client.user_id));
        assert!(!can_access_conversation(&client, Uuid::new_v4()));
        assert!(can_access_conversation(&emp, Uuid::new_v4()));
    }
}
