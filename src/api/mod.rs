use crate::{
    api::handlers::health,
    gate::{request_gate, RequestGate, SessionProbe},
    session::SessionManager,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::options,
    Extension, Router,
};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    services::{ServeDir, ServeFile},
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::insights::GoalCoach;
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the whole application.
///
/// Every response, static files included, passes through the request gate;
/// the gate itself lets `/api` and asset paths through untouched.
pub fn app(
    sessions: Arc<SessionManager>,
    probe: Arc<dyn SessionProbe>,
    coach: GoalCoach,
    static_dir: Option<&Path>,
) -> Router {
    let gate = Arc::new(RequestGate::new(sessions.config().clone(), probe));

    let (router, _openapi) = router().split_for_parts();
    let router = router.route("/health", options(health::health));
    let router = match static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    router
        .layer(middleware::from_fn_with_state(gate, request_gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(sessions))
                .layer(Extension(coach)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::LocalSessionProbe;
    use crate::session::{SessionConfig, UnclassifiedPolicy};
    use axum::http::{header::LOCATION, StatusCode};
    use tower::ServiceExt;

    fn test_app(config: SessionConfig, static_dir: Option<&Path>) -> Router {
        let sessions = Arc::new(SessionManager::new(config));
        let probe = Arc::new(LocalSessionProbe::new(sessions.clone()));
        app(sessions, probe, GoalCoach::default(), static_dir)
    }

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() -> anyhow::Result<()> {
        let response = test_app(SessionConfig::new(false), None)
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(Ulid::from_string(request_id).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn caller_request_id_is_kept() -> anyhow::Result<()> {
        let response = test_app(SessionConfig::new(false), None)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response.headers().get("x-request-id"),
            Some(&HeaderValue::from_static("abc-123"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn gate_runs_in_front_of_static_files() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("goalkeeper-static-{}", Ulid::new()));
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("index.html"), "<html>app</html>")?;

        let app = test_app(SessionConfig::new(false), Some(&dir));
        let protected = app
            .clone()
            .oneshot(Request::builder().uri("/dashboard").body(Body::empty())?)
            .await?;
        assert_eq!(protected.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            protected.headers().get(LOCATION),
            Some(&HeaderValue::from_static("/signin?next=%2Fdashboard"))
        );

        let landing = app
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(landing.status(), StatusCode::OK);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[tokio::test]
    async fn health_stays_open_when_unclassified_paths_are_denied() -> anyhow::Result<()> {
        let config = SessionConfig::new(true).with_unclassified_policy(UnclassifiedPolicy::Deny);
        let app = test_app(config, None);

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(health.status(), StatusCode::OK);
        assert!(health.headers().get(LOCATION).is_none());

        let other = app
            .oneshot(Request::builder().uri("/pricing").body(Body::empty())?)
            .await?;
        assert_eq!(other.status(), StatusCode::TEMPORARY_REDIRECT);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found_without_static_dir() -> anyhow::Result<()> {
        let response = test_app(SessionConfig::new(false), None)
            .oneshot(Request::builder().uri("/about").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
