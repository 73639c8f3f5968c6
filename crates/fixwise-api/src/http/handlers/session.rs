//! Session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions/{id}/messages - Send a turn, get the agent reply
//! - POST   /api/v1/sessions/{id}          - Create a session explicitly
//! - GET    /api/v1/sessions/{id}          - Session snapshot
//! - GET    /api/v1/sessions/{id}/history  - Ordered turn history
//! - DELETE /api/v1/sessions/{id}          - Delete a session (idempotent)

use axum::Json;
use axum::extract::{Path, State};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::RepairPlan;
use fixwise_types::reply::{AgentReply, InboundImage};
use fixwise_types::session::{ImageRef, Session, SessionId, SessionMode, Turn};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

/// Body for `POST /sessions/{id}/messages`.
#[derive(Debug, Default, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Client handle for the image; generated when omitted.
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl MessageRequest {
    fn image(&self) -> Result<Option<InboundImage>, AppError> {
        let Some(encoded) = self.image_base64.as_deref().filter(|s| !s.trim().is_empty()) else {
            if self.image_ref.is_some() {
                return Err(AppError::Validation(
                    "image_ref requires image_base64".to_string(),
                ));
            }
            return Ok(None);
        };
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Validation(format!("image_base64 is not valid base64: {e}")))?;
        let reference = self
            .image_ref
            .clone()
            .unwrap_or_else(|| format!("upload-{}", Uuid::now_v7()));
        Ok(Some(InboundImage::new(ImageRef::new(reference), data)))
    }
}

/// Session snapshot returned by `GET /sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub mode: SessionMode,
    pub turn_count: usize,
    pub current_step_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<RepairPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<ItemAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<Session> for SessionView {
    fn from(s: Session) -> Self {
        Self {
            mode: s.mode(),
            turn_count: s.history().len(),
            plan: s.last_plan().cloned(),
            id: s.id,
            current_step_index: s.current_step_index,
            assessment: s.last_assessment,
            last_image: s.last_image,
            created_at: s.created_at,
            last_activity_at: s.last_activity_at,
        }
    }
}

fn session_path(id: &str) -> String {
    format!("/api/v1/sessions/{id}")
}

/// POST /api/v1/sessions/{id}/messages - Process one turn.
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<ApiResponse<AgentReply>>, AppError> {
    let clock = RequestClock::start();
    let image = body.image()?;

    let reply = state
        .manager
        .handle_message(&SessionId::from(session_id.as_str()), body.text.as_deref(), image.as_ref())
        .await?;

    let path = session_path(&session_id);
    Ok(Json(
        clock
            .success(reply)
            .with_link("session", &path)
            .with_link("history", &format!("{path}/history")),
    ))
}

/// POST /api/v1/sessions/{id} - Create an empty session.
pub async fn create_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let clock = RequestClock::start();
    let session = state
        .manager
        .create_session(&SessionId::from(session_id.as_str()))
        .await?;

    Ok(Json(
        clock
            .success(SessionView::from(session))
            .with_link("self", &session_path(&session_id))
            .with_link("messages", &format!("{}/messages", session_path(&session_id))),
    ))
}

/// GET /api/v1/sessions/{id} - Session snapshot.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let clock = RequestClock::start();
    let session = state
        .manager
        .get_session(&SessionId::from(session_id.as_str()))
        .await?;

    Ok(Json(
        clock
            .success(SessionView::from(session))
            .with_link("self", &session_path(&session_id))
            .with_link("history", &format!("{}/history", session_path(&session_id))),
    ))
}

/// GET /api/v1/sessions/{id}/history - Turns in append order.
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Turn>>>, AppError> {
    let clock = RequestClock::start();
    let turns = state
        .manager
        .get_history(&SessionId::from(session_id.as_str()))
        .await?;

    Ok(Json(
        clock
            .success(turns)
            .with_link("session", &session_path(&session_id)),
    ))
}

/// DELETE /api/v1/sessions/{id} - Delete a session. Unknown ids succeed.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let clock = RequestClock::start();
    state
        .manager
        .delete_session(&SessionId::from(session_id.as_str()))
        .await?;

    Ok(Json(clock.success(serde_json::json!({
        "id": session_id,
        "deleted": true,
    }))))
}
