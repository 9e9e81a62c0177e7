//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::auth::Role;
use crate::chat::model::{Conversation, ConversationSummary};
use crate::checklist::model::{Category, ChecklistItem, Subcategory};
use crate::documents::DocumentRecord;
use crate::error::DatabaseError;
use crate::reminders::model::{EmailStatus, Reminder};
use crate::store::migrations;
use crate::store::traits::Database;
use crate::users::UserRecord;

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_optional_uuid(s: Option<String>) -> Option<Uuid> {
    s.map(|s| parse_uuid(&s))
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Client => "client",
        Role::Employee => "employee",
        Role::Owner => "owner",
    }
}

fn str_to_role(s: &str) -> Role {
    match s {
        "employee" => Role::Employee,
        "owner" => Role::Owner,
        _ => Role::Client,
    }
}

fn email_status_to_str(status: EmailStatus) -> &'static str {
    match status {
        EmailStatus::Queued => "queued",
        EmailStatus::Sent => "sent",
        EmailStatus::Failed => "failed",
    }
}

fn str_to_email_status(s: &str) -> EmailStatus {
    match s {
        "sent" => EmailStatus::Sent,
        "failed" => EmailStatus::Failed,
        _ => EmailStatus::Queued,
    }
}

fn category_to_str(category: Category) -> &'static str {
    match category {
        Category::QuoteFollowUp => "Quote Follow Up",
        Category::Life => "Life",
        Category::Commercial => "Commercial",
        Category::PlHome => "PL Home",
        Category::PlAuto => "PL Auto",
        Category::PlRenters => "PL Renters",
    }
}

fn str_to_category(s: &str) -> Option<Category> {
    match s {
        "Quote Follow Up" => Some(Category::QuoteFollowUp),
        "Life" => Some(Category::Life),
        "Commercial" => Some(Category::Commercial),
        "PL Home" => Some(Category::PlHome),
        "PL Auto" => Some(Category::PlAuto),
        "PL Renters" => Some(Category::PlRenters),
        _ => None,
    }
}

fn subcategory_to_str(subcategory: Subcategory) -> &'static str {
    match subcategory {
        Subcategory::QuotesFollowUp => "Quotes Follow Up",
        Subcategory::NoPay => "No Pay",
        Subcategory::Cancellation => "Cancellation",
        Subcategory::DocumentsNeeded => "Documents Needed",
        Subcategory::Renewal => "Renewal",
        Subcategory::Endorsement => "Endorsement",
        Subcategory::Claim => "Claim",
    }
}

fn str_to_subcategory(s: &str) -> Option<Subcategory> {
    match s {
        "Quotes Follow Up" => Some(Subcategory::QuotesFollowUp),
        "No Pay" => Some(Subcategory::NoPay),
        "Cancellation" => Some(Subcategory::Cancellation),
        "Documents Needed" => Some(Subcategory::DocumentsNeeded),
        "Renewal" => Some(Subcategory::Renewal),
        "Endorsement" => Some(Subcategory::Endorsement),
        "Claim" => Some(Subcategory::Claim),
        _ => None,
    }
}

/// Column list shared by every reminder SELECT.
const REMINDER_COLUMNS: &str = "id, title, message, scheduled_time, creator_id, updated_by, \
     creator_role, send_email, target_email, email_subject, email_body, for_client, \
     sent, sent_at, email_status, last_error, deleted, category, subcategory, \
     created_at, updated_at";

fn row_to_reminder(row: &libsql::Row) -> Result<Reminder, libsql::Error> {
    Ok(Reminder {
        id: parse_uuid(&row.get::<String>(0)?),
        title: row.get(1)?,
        message: row.get(2)?,
        scheduled_time: parse_datetime(&row.get::<String>(3)?),
        creator_id: parse_uuid(&row.get::<String>(4)?),
        updated_by: parse_optional_uuid(row.get::<String>(5).ok()),
        creator_role: str_to_role(&row.get::<String>(6)?),
        send_email: row.get::<i64>(7)? != 0,
        target_email: row.get(8).ok(),
        email_subject: row.get(9).ok(),
        email_body: row.get(10).ok(),
        for_client: row.get::<i64>(11)? != 0,
        sent: row.get::<i64>(12)? != 0,
        sent_at: parse_optional_datetime(row.get::<String>(13).ok()),
        email_status: str_to_email_status(&row.get::<String>(14)?),
        last_error: row.get(15).ok(),
        deleted: row.get::<i64>(16)? != 0,
        category: row.get::<String>(17).ok().as_deref().and_then(str_to_category),
        subcategory: row
            .get::<String>(18)
            .ok()
            .as_deref()
            .and_then(str_to_subcategory),
        created_at: parse_datetime(&row.get::<String>(19)?),
        updated_at: parse_datetime(&row.get::<String>(20)?),
    })
}

const CHECKLIST_COLUMNS: &str = "id, creator_id, text, deadline, completed, completed_at, \
     deleted, category, subcategory, created_at, updated_at";

fn row_to_checklist_item(row: &libsql::Row) -> Result<ChecklistItem, libsql::Error> {
    Ok(ChecklistItem {
        id: parse_uuid(&row.get::<String>(0)?),
        creator_id: parse_uuid(&row.get::<String>(1)?),
        text: row.get(2)?,
        deadline: parse_optional_datetime(row.get::<String>(3).ok()),
        completed: row.get::<i64>(4)? != 0,
        completed_at: parse_optional_datetime(row.get::<String>(5).ok()),
        deleted: row.get::<i64>(6)? != 0,
        category: str_to_category(&row.get::<String>(7)?).unwrap_or(Category::QuoteFollowUp),
        subcategory: str_to_subcategory(&row.get::<String>(8)?)
            .unwrap_or(Subcategory::QuotesFollowUp),
        created_at: parse_datetime(&row.get::<String>(9)?),
        updated_at: parse_datetime(&row.get::<String>(10)?),
    })
}

fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord, libsql::Error> {
    Ok(DocumentRecord {
        id: parse_uuid(&row.get::<String>(0)?),
        owner_id: parse_uuid(&row.get::<String>(1)?),
        folder: row.get(2)?,
        file_name: row.get(3)?,
        url: row.get(4)?,
        content_type: row.get(5)?,
        uploaded_at: parse_datetime(&row.get::<String>(6)?),
    })
}

fn row_to_user(row: &libsql::Row) -> Result<UserRecord, libsql::Error> {
    Ok(UserRecord {
        id: parse_uuid(&row.get::<String>(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role: str_to_role(&row.get::<String>(3)?),
        created_at: parse_datetime(&row.get::<String>(4)?),
    })
}

fn conversation_from_doc(doc: &str) -> Result<Conversation, DatabaseError> {
    serde_json::from_str(doc).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn query_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Reminders ───────────────────────────────────────────────────

    async fn insert_reminder(&self, r: &Reminder) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO reminders (id, title, message, scheduled_time, creator_id, \
                 updated_by, creator_role, send_email, target_email, email_subject, email_body, \
                 for_client, sent, sent_at, email_status, last_error, deleted, category, \
                 subcategory, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21)",
                params![
                    r.id.to_string(),
                    r.title.clone(),
                    r.message.clone(),
                    r.scheduled_time.to_rfc3339(),
                    r.creator_id.to_string(),
                    opt_text(r.updated_by.map(|u| u.to_string())),
                    role_to_str(r.creator_role),
                    r.send_email as i64,
                    opt_text(r.target_email.clone()),
                    opt_text(r.email_subject.clone()),
                    opt_text(r.email_body.clone()),
                    r.for_client as i64,
                    r.sent as i64,
                    opt_text(r.sent_at.map(|t| t.to_rfc3339())),
                    email_status_to_str(r.email_status),
                    opt_text(r.last_error.clone()),
                    r.deleted as i64,
                    opt_text(r.category.map(|c| category_to_str(c).to_string())),
                    opt_text(r.subcategory.map(|s| subcategory_to_str(s).to_string())),
                    r.created_at.to_rfc3339(),
                    r.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_reminder(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_reminders(&self, include_deleted: bool) -> Result<Vec<Reminder>, DatabaseError> {
        let sql = if include_deleted {
            format!("SELECT {REMINDER_COLUMNS} FROM reminders ORDER BY scheduled_time")
        } else {
            format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders WHERE deleted = 0 ORDER BY scheduled_time"
            )
        };
        let mut rows = self.conn().query(&sql, ()).await.map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_reminder(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    async fn update_reminder(&self, r: &Reminder) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE reminders SET title = ?2, message = ?3, scheduled_time = ?4, \
                 updated_by = ?5, send_email = ?6, target_email = ?7, email_subject = ?8, \
                 email_body = ?9, for_client = ?10, sent = ?11, sent_at = ?12, \
                 email_status = ?13, last_error = ?14, deleted = ?15, category = ?16, \
                 subcategory = ?17, updated_at = ?18 WHERE id = ?1",
                params![
                    r.id.to_string(),
                    r.title.clone(),
                    r.message.clone(),
                    r.scheduled_time.to_rfc3339(),
                    opt_text(r.updated_by.map(|u| u.to_string())),
                    r.send_email as i64,
                    opt_text(r.target_email.clone()),
                    opt_text(r.email_subject.clone()),
                    opt_text(r.email_body.clone()),
                    r.for_client as i64,
                    r.sent as i64,
                    opt_text(r.sent_at.map(|t| t.to_rfc3339())),
                    email_status_to_str(r.email_status),
                    opt_text(r.last_error.clone()),
                    r.deleted as i64,
                    opt_text(r.category.map(|c| category_to_str(c).to_string())),
                    opt_text(r.subcategory.map(|s| subcategory_to_str(s).to_string())),
                    r.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "reminder".into(),
                id: r.id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_reminder_deleted(&self, id: Uuid, deleted: bool) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE reminders SET deleted = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), deleted as i64, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "reminder".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {REMINDER_COLUMNS} FROM reminders \
                     WHERE deleted = 0 AND send_email = 1 AND sent = 0 AND scheduled_time <= ?1 \
                     ORDER BY scheduled_time ASC LIMIT ?2"
                ),
                params![now.to_rfc3339(), limit as i64],
            )
            .await
            .map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_reminder(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    // ── Checklist ───────────────────────────────────────────────────

    async fn insert_checklist_item(&self, item: &ChecklistItem) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO checklist_items (id, creator_id, text, deadline, completed, \
                 completed_at, deleted, category, subcategory, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    item.id.to_string(),
                    item.creator_id.to_string(),
                    item.text.clone(),
                    opt_text(item.deadline.map(|t| t.to_rfc3339())),
                    item.completed as i64,
                    opt_text(item.completed_at.map(|t| t.to_rfc3339())),
                    item.deleted as i64,
                    category_to_str(item.category),
                    subcategory_to_str(item.subcategory),
                    item.created_at.to_rfc3339(),
                    item.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_checklist_item(
        &self,
        id: Uuid,
    ) -> Result<Option<ChecklistItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CHECKLIST_COLUMNS} FROM checklist_items WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_checklist_item(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_checklist_items(
        &self,
        owner: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<ChecklistItem>, DatabaseError> {
        let sql = if include_deleted {
            format!(
                "SELECT {CHECKLIST_COLUMNS} FROM checklist_items WHERE creator_id = ?1 \
                 ORDER BY created_at"
            )
        } else {
            format!(
                "SELECT {CHECKLIST_COLUMNS} FROM checklist_items \
                 WHERE creator_id = ?1 AND deleted = 0 ORDER BY created_at"
            )
        };
        let mut rows = self
            .conn()
            .query(&sql, params![owner.to_string()])
            .await
            .map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_checklist_item(&row).map_err(query_err)?);
        }
        Ok(out)
    }

    async fn update_checklist_item(&self, item: &ChecklistItem) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE checklist_items SET text = ?2, deadline = ?3, completed = ?4, \
                 completed_at = ?5, deleted = ?6, category = ?7, subcategory = ?8, \
                 updated_at = ?9 WHERE id = ?1",
                params![
                    item.id.to_string(),
                    item.text.clone(),
                    opt_text(item.deadline.map(|t| t.to_rfc3339())),
                    item.completed as i64,
                    opt_text(item.completed_at.map(|t| t.to_rfc3339())),
                    item.deleted as i64,
                    category_to_str(item.category),
                    subcategory_to_str(item.subcategory),
                    item.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "checklist_item".into(),
                id: item.id.to_string(),
            });
        }
        Ok(())
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn insert_conversation_if_absent(
        &self,
        convo: &Conversation,
    ) -> Result<(), DatabaseError> {
        let doc = serde_json::to_string(convo)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO conversations (id, client_id, doc, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) ON CONFLICT(client_id) DO NOTHING",
                params![
                    convo.id.to_string(),
                    convo.client_id.to_string(),
                    doc,
                    convo.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT doc FROM conversations WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let doc: String = row.get(0).map_err(query_err)?;
                Ok(Some(conversation_from_doc(&doc)?))
            }
            None => Ok(None),
        }
    }

    async fn get_conversation_by_client(
        &self,
        client_id: Uuid,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT doc FROM conversations WHERE client_id = ?1",
                params![client_id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let doc: String = row.get(0).map_err(query_err)?;
                Ok(Some(conversation_from_doc(&doc)?))
            }
            None => Ok(None),
        }
    }

    async fn put_conversation(&self, convo: &Conversation) -> Result<(), DatabaseError> {
        let doc = serde_json::to_string(convo)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let affected = self
            .conn()
            .execute(
                "UPDATE conversations SET doc = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    convo.id.to_string(),
                    doc,
                    convo.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "conversation".into(),
                id: convo.id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_conversation_summaries(
        &self,
    ) -> Result<Vec<ConversationSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT doc FROM conversations ORDER BY updated_at DESC",
                (),
            )
            .await
            .map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            let doc: String = row.get(0).map_err(query_err)?;
            let convo = conversation_from_doc(&doc)?;
            out.push(ConversationSummary::from(&convo));
        }
        Ok(out)
    }

    // ── Documents ───────────────────────────────────────────────────

    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO documents (id, owner_id, folder, file_name, url, content_type, \
                 uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.owner_id.to_string(),
                    record.folder.clone(),
                    record.file_name.clone(),
                    record.url.clone(),
                    record.content_type.clone(),
                    record.uploaded_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, owner_id, folder, file_name, url, content_type, uploaded_at \
                 FROM documents WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_document(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn get_document_by_url(
        &self,
        url: &str,
    ) -> Result<Option<DocumentRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, owner_id, folder, file_name, url, content_type, uploaded_at \
                 FROM documents WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_document(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_documents(
        &self,
        owner: Option<Uuid>,
    ) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let mut out = Vec::new();
        match owner {
            Some(owner) => {
                let mut rows = self
                    .conn()
                    .query(
                        "SELECT id, owner_id, folder, file_name, url, content_type, uploaded_at \
                         FROM documents WHERE owner_id = ?1 ORDER BY uploaded_at DESC",
                        params![owner.to_string()],
                    )
                    .await
                    .map_err(query_err)?;
                while let Some(row) = rows.next().await.map_err(query_err)? {
                    out.push(row_to_document(&row).map_err(query_err)?);
                }
            }
            None => {
                let mut rows = self
                    .conn()
                    .query(
                        "SELECT id, owner_id, folder, file_name, url, content_type, uploaded_at \
                         FROM documents ORDER BY uploaded_at DESC",
                        (),
                    )
                    .await
                    .map_err(query_err)?;
                while let Some(row) = rows.next().await.map_err(query_err)? {
                    out.push(row_to_document(&row).map_err(query_err)?);
                }
            }
        }
        Ok(out)
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM documents WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "document".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, role, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET name = ?2, email = ?3, role = ?4",
                params![
                    user.id.to_string(),
                    user.name.clone(),
                    user.email.clone(),
                    role_to_str(user.role),
                    user.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_user(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT id, name, email, role, created_at FROM users ORDER BY name", ())
            .await
            .map_err(query_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            out.push(row_to_user(&row).map_err(query_err)?);
        }
        Ok(out)
    }
}
