//! `POST /api/ai/goal-insights`: streamed coaching text for one goal.

use axum::{
    body::{Body, Bytes},
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use super::{auth::principal::require_session, error_response, ErrorBody};
use crate::{
    insights::{generation_for, parse_request, GoalInsightsRequest, Issue, TextGenerator},
    session::SessionManager,
};

/// The configured text generator, if any.
#[derive(Clone, Default)]
pub struct GoalCoach {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GoalCoach {
    #[must_use]
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvalidRequest {
    pub error: String,
    pub issues: Vec<Issue>,
}

#[utoipa::path(
    post,
    path = "/api/ai/goal-insights",
    request_body = GoalInsightsRequest,
    responses(
        (
            status = 200,
            description = "Coaching text, streamed",
            body = String,
            content_type = "text/plain"
        ),
        (status = 400, description = "Payload failed validation", body = InvalidRequest),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody),
        (status = 501, description = "No text generator configured", body = ErrorBody)
    ),
    tag = "ai"
)]
pub async fn goal_insights(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
    coach: Extension<GoalCoach>,
    body: Bytes,
) -> Response {
    // Authenticate before spending tokens.
    let principal = match require_session(&headers, &sessions) {
        Ok(principal) => principal,
        Err(StatusCode::UNAUTHORIZED) => {
            return error_response(StatusCode::UNAUTHORIZED, ErrorBody::new("Unauthorized"));
        }
        Err(_) => return internal_error(),
    };

    let Some(generator) = coach.generator.as_ref() else {
        return error_response(
            StatusCode::NOT_IMPLEMENTED,
            ErrorBody::new("AI not configured (missing API key)."),
        );
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            error!("AI goal insights error: {err}");
            return internal_error();
        }
    };

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(issues) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(InvalidRequest {
                    error: "Invalid request".to_string(),
                    issues,
                }),
            )
                .into_response();
        }
    };

    debug!(subject = %principal.subject_id, goal = %request.goal.id, "generating goal insights");
    let generation = generation_for(&request.goal, Utc::now());
    match generator.stream(&generation).await {
        Ok(stream) => (
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(stream),
        )
            .into_response(),
        Err(err) => {
            error!("AI goal insights error: {err:#}");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new("Internal error"))
}
