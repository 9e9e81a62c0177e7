//! Reminder data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;
use crate::checklist::model::{Category, Subcategory};
use crate::error::ApiError;
use crate::mailer::is_valid_email;

/// Email delivery state of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Queued,
    Sent,
    Failed,
}

/// A user-scheduled reminder, optionally delivered by email when due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    pub creator_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Uuid>,
    /// Role of the creator at creation time.
    pub creator_role: Role,
    pub send_email: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    /// Staff-authored reminder directed at a client.
    pub for_client: bool,
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub email_status: EmailStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Subcategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub target_email: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub email_body: Option<String>,
    #[serde(default)]
    pub for_client: bool,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub subcategory: Option<Subcategory>,
}

/// Whitelisted update payload — everything else is dispatcher-owned.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub send_email: Option<bool>,
    #[serde(default)]
    pub target_email: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub email_body: Option<String>,
    #[serde(default)]
    pub for_client: Option<bool>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub subcategory: Option<Subcategory>,
}

impl Reminder {
    pub fn new(new: NewReminder, creator_id: Uuid, creator_role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            message: new.message,
            scheduled_time: new.scheduled_time,
            creator_id,
            updated_by: None,
            creator_role,
            send_email: new.send_email,
            target_email: new.target_email,
            email_subject: new.email_subject,
            email_body: new.email_body,
            for_client: new.for_client,
            sent: false,
            sent_at: None,
            email_status: EmailStatus::Queued,
            last_error: None,
            deleted: false,
            category: new.category,
            subcategory: new.subcategory,
            created_at: now,
            updated_at: now,
        }
    }

    /// `send_email == true` requires a syntactically valid target address.
    /// Enforced at write time so the caller is rejected synchronously.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::Validation("title is required".into()));
        }
        if self.send_email {
            match self.target_email.as_deref() {
                Some(addr) if is_valid_email(addr) => {}
                Some(addr) => {
                    return Err(ApiError::Validation(format!(
                        "invalid target email address: {addr}"
                    )));
                }
                None => {
                    return Err(ApiError::Validation(
                        "targetEmail is required when sendEmail is set".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Apply a whitelisted update.
    pub fn apply(&mut self, update: ReminderUpdate, updated_by: Uuid, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(scheduled_time) = update.scheduled_time {
            self.scheduled_time = scheduled_time;
        }
        if let Some(send_email) = update.send_email {
            self.send_email = send_email;
        }
        if let Some(target_email) = update.target_email {
            self.target_email = Some(target_email);
        }
        if let Some(email_subject) = update.email_subject {
            self.email_subject = Some(email_subject);
        }
        if let Some(email_body) = update.email_body {
            self.email_body = Some(email_body);
        }
        if let Some(for_client) = update.for_client {
            self.for_client = for_client;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(subcategory) = update.subcategory {
            self.subcategory = Some(subcategory);
        }
        self.updated_by = Some(updated_by);
        self.updated_at = now;
    }

    /// Email subject, defaulted from the title.
    pub fn effective_subject(&self) -> &str {
        self.email_subject.as_deref().unwrap_or(&self.title)
    }

    /// Email body, defaulted from the message.
    pub fn effective_body(&self) -> &str {
        self.email_body.as_deref().unwrap_or(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Reminder {
        Reminder::new(
            NewReminder {
                title: "Policy renewal".into(),
                message: "Auto policy renews Friday".into(),
                scheduled_time: Utc::now(),
                send_email: false,
                target_email: None,
                email_subject: None,
                email_body: None,
                for_client: false,
                category: None,
                subcategory: None,
            },
            Uuid::new_v4(),
            Role::Client,
        )
    }

    #[test]
    fn payloads_deserialize_camel_case() {
        let new: NewReminder = serde_json::from_str(
            r#"{"title":"Call back","message":"Quote ready","scheduledTime":"2026-09-01T12:00:00Z","sendEmail":true,"targetEmail":"client@example.com","forClient":true}"#,
        )
        .unwrap();
        assert!(new.send_email);
        assert_eq!(new.target_email.as_deref(), Some("client@example.com"));
        assert!(new.for_client);

        let update: ReminderUpdate =
            serde_json::from_str(r#"{"emailSubject":"Updated","sendEmail":false}"#).unwrap();
        assert_eq!(update.email_subject.as_deref(), Some("Updated"));
        assert_eq!(update.send_email, Some(false));
    }

    #[test]
    fn new_reminder_starts_unsent_and_queued() {
        let r = base();
        assert!(!r.sent);
        assert!(!r.deleted);
        assert!(r.sent_at.is_none());
        assert_eq!(r.email_status, EmailStatus::Queued);
    }

    #[test]
    fn send_email_requires_valid_target() {
        let mut r = base();
        r.send_email = true;
        assert!(r.validate().is_err());

        r.target_email = Some("not-an-email".into());
        assert!(r.validate().is_err());

        r.target_email = Some("client@example.com".into());
        assert!(r.validate().is_ok());
    }

    #[test]
    fn subject_and_body_default_from_title_and_message() {
        let mut r = base();
        assert_eq!(r.effective_subject(), "Policy renewal");
        assert_eq!(r.effective_body(), "Auto policy renews Friday");

        r.email_subject = Some("Reminder".into());
        r.email_body = Some("See attached".into());
        assert_eq!(r.effective_subject(), "Reminder");
        assert_eq!(r.effective_body(), "See attached");
    }

    #[test]
    fn update_is_whitelisted() {
        let mut r = base();
        let editor = Uuid::new_v4();
        let now = Utc::now();
        r.apply(
            ReminderUpdate {
                title: Some("New title".into()),
                ..Default::default()
            },
            editor,
            now,
        );
        assert_eq!(r.title, "New title");
        assert_eq!(r.updated_by, Some(editor));
        // Dispatcher-owned fields untouched.
        assert!(!r.sent);
        assert_eq!(r.email_status, EmailStatus::Queued);
    }
}
