use axum::{Extension, Json, extract::State};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use vista_db::models::{ConversationLogRow, NewConversationLog};
use vista_types::api::{ChatResponse, Page};

use crate::error::ApiError;
use crate::extract::{ApiMultipart, ApiQuery};
use crate::images::StoredImage;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};

/// Upload accepted from the `image` form field.
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// POST /multimodal-chat, multipart with optional `text_query` and `image`.
///
/// Model failures do not fail the request: the fallback message is logged and
/// returned like any other answer, with `degraded` set.
pub async fn multimodal_chat(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut text_query: Option<String> = None;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text_query") => {
                text_query = Some(field.text().await.map_err(bad_multipart)?);
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                // Browsers send an empty part when no file was picked
                if !(filename.is_empty() && bytes.is_empty()) {
                    upload = Some(Upload { filename, bytes });
                }
            }
            other => warn!("Ignoring unexpected form field {:?}", other),
        }
    }

    let text_query = text_query.filter(|q| !q.is_empty());
    if text_query.is_none() && upload.is_none() {
        return Err(ApiError::validation("Must provide text or image"));
    }

    let stored: Option<StoredImage> = match upload {
        Some(upload) => Some(state.images.save(&upload.filename, upload.bytes).await?),
        None => None,
    };

    let result = state
        .orchestrator
        .process_interaction(text_query.as_deref(), stored.as_ref().map(|s| s.bytes.as_slice()))
        .await;

    let log = NewConversationLog {
        user_id: user.id,
        text_query,
        image_url: stored.map(|s| s.url),
        response_text: result.response,
        llm_model_name: result.llm_model,
        vlm_model_name: result.vlm_model,
    };

    let db = state.clone();
    let row = blocking(move || db.db.insert_conversation_log(&log)).await?;

    info!(
        "Logged interaction {} for user {} (degraded: {})",
        row.id, user.email, result.degraded
    );

    let mut response = to_response(row);
    response.degraded = result.degraded;
    Ok(Json(response))
}

/// GET /multimodal-chat/history, the caller's log newest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<ChatResponse>>, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_conversation_logs(user.id, page.skip, page.limit)).await?;

    Ok(Json(rows.into_iter().map(to_response).collect()))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::validation(format!("Invalid multipart body: {}", e.body_text()))
}

fn to_response(row: ConversationLogRow) -> ChatResponse {
    ChatResponse {
        timestamp: parse_timestamp(&row.timestamp).unwrap_or_else(|| {
            warn!("Corrupt timestamp '{}' on conversation log {}", row.timestamp, row.id);
            DateTime::default()
        }),
        id: row.id,
        text_query: row.text_query,
        image_url: row.image_url,
        response_text: row.response_text,
        llm_model: row.llm_model_name,
        vlm_model: row.vlm_model_name,
        degraded: false,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; it is UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        let a = parse_timestamp("2026-10-16T09:30:00+02:00").unwrap();
        assert_eq!(a.hour(), 7);

        let b = parse_timestamp("2026-10-16 09:30:00").unwrap();
        assert_eq!((b.year(), b.hour()), (2026, 9));

        assert!(parse_timestamp("yesterday").is_none());
    }
}
