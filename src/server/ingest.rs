use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::ingestion::IngestJob;
use crate::store::DocStatus;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct IngestUrlRequest {
    pub url: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// `POST /ingest-url` — queue a web page for ingestion.
///
/// Idempotent on the URL: a document already queued, processing, or completed
/// is returned as-is instead of being re-enqueued. A previously failed
/// document is retried under its existing id.
pub async fn ingest_url(
    State(state): State<AppState>,
    Json(request): Json<IngestUrlRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let url = request.url.trim();
    let parsed = Url::parse(url).map_err(|_| ApiError::bad_request("invalid url"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::bad_request("url must be http or https"));
    }

    if let Some(existing) = state.store.find_document_by_locator(url).await? {
        if existing.status.is_in_flight_or_done() {
            return Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "doc_id": existing.doc_id,
                    "status": existing.status,
                    "detail": format!("document already {}", existing.status),
                })),
            ));
        }
        // Pending or failed: retry under the same document id.
        let job = IngestJob::url(&existing.doc_id, url);
        let job_id = job.job_id;
        state.queue.enqueue(job)?;
        state
            .store
            .set_document_status(&existing.doc_id, DocStatus::Queued)
            .await?;
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "job_id": job_id, "doc_id": existing.doc_id })),
        ));
    }

    let doc_id = Uuid::new_v4().to_string();
    let source = request.source.as_deref().unwrap_or("web");
    state
        .store
        .insert_document(&doc_id, url, source, DocStatus::Pending, None)
        .await?;

    let job = IngestJob::url(&doc_id, url);
    let job_id = job.job_id;
    state.queue.enqueue(job)?;
    state
        .store
        .set_document_status(&doc_id, DocStatus::Queued)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "doc_id": doc_id })),
    ))
}

/// `POST /upload` — accept a PDF and queue it for ingestion.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if let Some(name) = field.file_name().map(str::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")))?;
            file = Some((name, bytes.to_vec()));
            break;
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::bad_request("no file in multipart body"))?;
    if !file_name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ApiError::bad_request("only PDF uploads are supported"));
    }

    let doc_id = Uuid::new_v4().to_string();
    let path = state.settings.upload_dir.join(format!("{doc_id}.pdf"));
    tokio::fs::create_dir_all(&state.settings.upload_dir)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to create upload dir: {err}")))?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to store upload: {err}")))?;

    let locator = file_uri(&path);
    state
        .store
        .insert_document(&doc_id, &locator, "upload", DocStatus::Queued, Some(&file_name))
        .await?;

    let job = IngestJob::file(&doc_id, &path);
    let job_id = job.job_id;
    state.queue.enqueue(job)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "doc_id": doc_id, "url": locator })),
    ))
}

/// Locator for a stored upload; falls back to the raw path when the path
/// cannot be made absolute.
fn file_uri(path: &FsPath) -> String {
    std::fs::canonicalize(path)
        .ok()
        .and_then(|absolute| Url::from_file_path(absolute).ok())
        .map(String::from)
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// `GET /documents/{doc_id}/pdf` — resolve a document back to viewable bytes.
///
/// Resolution order: the locally stored upload, then a `file://` locator,
/// then a plain filesystem path, then a redirect for remote URLs.
pub async fn document_pdf(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Response, ApiError> {
    let document = state
        .store
        .get_document(&doc_id)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;

    let local = state.settings.upload_dir.join(format!("{doc_id}.pdf"));
    if local.is_file() {
        return serve_pdf(&local).await;
    }

    if let Ok(parsed) = Url::parse(&document.url) {
        match parsed.scheme() {
            "file" => {
                if let Ok(path) = parsed.to_file_path() {
                    if path.is_file() {
                        return serve_pdf(&path).await;
                    }
                }
            }
            "http" | "https" => {
                return Ok(Redirect::temporary(&document.url).into_response());
            }
            _ => {}
        }
    }

    let plain = PathBuf::from(&document.url);
    if plain.is_file() {
        return serve_pdf(&plain).await;
    }

    Err(ApiError::not_found("document file not available"))
}

async fn serve_pdf(path: &FsPath) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to read document: {err}")))?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}
