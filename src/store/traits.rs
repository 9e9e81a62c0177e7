//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::chat::model::{Conversation, ConversationSummary};
use crate::checklist::model::ChecklistItem;
use crate::documents::DocumentRecord;
use crate::error::DatabaseError;
use crate::reminders::model::Reminder;
use crate::users::UserRecord;

/// Backend-agnostic database trait covering reminders, checklist items,
/// conversations, document metadata, and users.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Reminders ───────────────────────────────────────────────────

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError>;

    async fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>, DatabaseError>;

    /// All non-deleted reminders (authorization filtering happens above).
    /// `include_deleted` widens to soft-deleted rows for restore flows.
    async fn list_reminders(&self, include_deleted: bool) -> Result<Vec<Reminder>, DatabaseError>;

    /// Whole-row write of an existing reminder.
    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), DatabaseError>;

    /// Flip the soft-delete flag.
    async fn set_reminder_deleted(&self, id: Uuid, deleted: bool) -> Result<(), DatabaseError>;

    /// Due selection: `deleted=false AND send_email=true AND sent=false AND
    /// scheduled_time <= now`, ascending by `scheduled_time`, capped at `limit`.
    async fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, DatabaseError>;

    // ── Checklist ───────────────────────────────────────────────────

    async fn insert_checklist_item(&self, item: &ChecklistItem) -> Result<(), DatabaseError>;

    async fn get_checklist_item(&self, id: Uuid)
    -> Result<Option<ChecklistItem>, DatabaseError>;

    /// Items created by `owner`, excluding soft-deleted unless asked for.
    async fn list_checklist_items(
        &self,
        owner: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<ChecklistItem>, DatabaseError>;

    async fn update_checklist_item(&self, item: &ChecklistItem) -> Result<(), DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// Insert if no conversation exists for this client; no-op otherwise.
    async fn insert_conversation_if_absent(
        &self,
        convo: &Conversation,
    ) -> Result<(), DatabaseError>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, DatabaseError>;

    async fn get_conversation_by_client(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Conversation>, DatabaseError>;

    /// Whole-document write (last write wins; no concurrency token).
    async fn put_conversation(&self, convo: &Conversation) -> Result<(), DatabaseError>;

    /// Slim projection over every conversation, for the staff listing.
    async fn list_conversation_summaries(
        &self,
    ) -> Result<Vec<ConversationSummary>, DatabaseError>;

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), DatabaseError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, DatabaseError>;

    async fn get_document_by_url(
        &self,
        url: &str,
    ) -> Result<Option<DocumentRecord>, DatabaseError>;

    /// Documents for one owner, or all when `owner` is `None`.
    async fn list_documents(
        &self,
        owner: Option<Uuid>,
    ) -> Result<Vec<DocumentRecord>, DatabaseError>;

    async fn delete_document(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;
}
