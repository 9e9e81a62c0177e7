//! Document storage — quote/policy uploads behind an `ObjectStore` boundary.
//!
//! The metadata row is written only after the object write succeeds, so a
//! failed upload never leaves an orphaned record. Deleting goes the other
//! way: the object delete is best-effort (log and proceed) so a storage
//! hiccup cannot leave an undeletable record.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{ApiError, StorageError};
use crate::store::Database;

/// URL prefix for stored objects. A storage key is everything after it,
/// so URL ⇄ key mapping round-trips losslessly.
pub const URL_PREFIX: &str = "/files/";

/// Metadata for one stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub folder: String,
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// External object store boundary.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key`, returning the stable URL.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Delete the object at `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Derive the storage key from a stored URL.
pub fn key_for_url(url: &str) -> Result<&str, StorageError> {
    url.strip_prefix(URL_PREFIX)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| StorageError::BadUrl(url.to_string()))
}

/// Compose the storage key for an upload.
pub fn object_key(folder: &str, object_id: Uuid, file_name: &str) -> String {
    format!("{folder}/{object_id}_{file_name}")
}

/// Filesystem-backed object store rooted at a data directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Read an object back (used by the download route).
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(self.path_for(key))
            .await
            .map_err(|e| StorageError::Upload(format!("read {key}: {e}")))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Upload(format!("mkdir for {key}: {e}")))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Upload(format!("write {key}: {e}")))?;
        Ok(format!("{URL_PREFIX}{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.path_for(key))
            .await
            .map_err(|e| StorageError::Delete(format!("{key}: {e}")))
    }
}

/// Basic PDF magic check ("is it a PDF").
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

// ── Routes ──────────────────────────────────────────────────────────

#[derive(Clone)]
struct DocState {
    store: Arc<dyn Database>,
    objects: Arc<FsObjectStore>,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    folder: String,
    file_name: String,
}

pub fn document_routes(store: Arc<dyn Database>, objects: Arc<FsObjectStore>) -> Router {
    Router::new()
        .route("/api/documents", post(upload).get(list))
        .route("/api/documents/{id}", delete(remove))
        .route("/files/{folder}/{name}", get(download))
        .with_state(DocState { store, objects })
}

async fn upload(
    State(state): State<DocState>,
    identity: Identity,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentRecord>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("empty upload".into()));
    }
    if !looks_like_pdf(&body) {
        return Err(ApiError::Validation("only PDF uploads are accepted".into()));
    }
    if params.folder.contains('/') || params.file_name.contains('/') {
        return Err(ApiError::Validation("folder and file_name must not contain '/'".into()));
    }

    let id = Uuid::new_v4();
    let key = object_key(&params.folder, id, &params.file_name);

    // Object first, metadata second — a failed upload leaves no record.
    let url = state.objects.put(&key, &body).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/pdf")
        .to_string();

    let record = DocumentRecord {
        id,
        owner_id: identity.user_id,
        folder: params.folder,
        file_name: params.file_name,
        url,
        content_type,
        uploaded_at: Utc::now(),
    };
    state.store.insert_document(&record).await?;

    tracing::info!(document_id = %record.id, folder = %record.folder, "Document uploaded");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list(
    State(state): State<DocState>,
    identity: Identity,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    let docs = if identity.role.is_staff() {
        state.store.list_documents(None).await?
    } else {
        state.store.list_documents(Some(identity.user_id)).await?
    };
    Ok(Json(docs))
}

async fn remove(
    State(state): State<DocState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .store
        .get_document(id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "document",
            id: id.to_string(),
        })?;

    if !identity.role.is_staff() && record.owner_id != identity.user_id {
        return Err(ApiError::Authorization("not your document".into()));
    }

    // Best-effort object delete; the metadata row goes away regardless.
    match key_for_url(&record.url) {
        Ok(key) => {
            if let Err(e) = state.objects.delete(key).await {
                tracing::warn!(document_id = %id, error = %e, "Object delete failed; removing metadata anyway");
            }
        }
        Err(e) => {
            tracing::warn!(document_id = %id, error = %e, "Could not derive storage key from URL");
        }
    }
    state.store.delete_document(id).await?;

    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

async fn download(
    State(state): State<DocState>,
    identity: Identity,
    Path((folder, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let key = format!("{folder}/{name}");
    let url = format!("{URL_PREFIX}{key}");

    // Resolve the metadata row for authorization.
    let record = state
        .store
        .get_document_by_url(&url)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "document",
            id: url.clone(),
        })?;
    if !identity.role.is_staff() && record.owner_id != identity.user_id {
        return Err(ApiError::Authorization("not your document".into()));
    }

    let bytes = state.objects.read(&key).await?;
    Ok(([(header::CONTENT_TYPE, record.content_type)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_key_round_trip_is_lossless() {
        let id = Uuid::new_v4();
        let key = object_key("quotes", id, "auto-quote.pdf");
        let url = format!("{URL_PREFIX}{key}");
        assert_eq!(key_for_url(&url).unwrap(), key);
    }

    #[test]
    fn key_for_unrelated_url_fails() {
        assert!(key_for_url("https://elsewhere.example/x.pdf").is_err());
        assert!(key_for_url("/files/").is_err());
    }

    #[test]
    fn pdf_magic_check() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"<html>"));
        assert!(!looks_like_pdf(b""));
    }

    #[tokio::test]
    async fn fs_store_put_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let key = object_key("policies", Uuid::new_v4(), "home.pdf");
        let url = store.put(&key, b"%PDF-1.4 test").await.unwrap();
        assert_eq!(key_for_url(&url).unwrap(), key);

        let bytes = store.read(&key).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 test");

        store.delete(&key).await.unwrap();
        assert!(store.read(&key).await.is_err());
    }

    #[tokio::test]
    async fn fs_store_delete_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.delete("nope/missing.pdf").await.is_err());
    }
}
