use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct HealthState {
    pub registrations: usize,
    pub transport_mode: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub dispatcher: HealthCheck,
    pub transport_mode: &'static str,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let dispatcher = dispatcher_check(state.registrations);
    let ready = dispatcher.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "u360-server runtime initialized".to_string(),
        },
        dispatcher,
        transport_mode: state.transport_mode,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn dispatcher_check(registrations: usize) -> HealthCheck {
    if registrations == 0 {
        HealthCheck { status: "degraded", detail: "no slack listeners are registered".to_string() }
    } else {
        HealthCheck { status: "ready", detail: format!("{registrations} slack listeners registered") }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_listeners_are_registered() {
        let (status, Json(payload)) =
            health(State(HealthState { registrations: 12, transport_mode: "noop" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.dispatcher.detail, "12 slack listeners registered");
        assert_eq!(payload.transport_mode, "noop");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_listeners() {
        let (status, Json(payload)) =
            health(State(HealthState { registrations: 0, transport_mode: "socket" })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.dispatcher.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn router_serves_health_as_json() {
        let app = router(HealthState { registrations: 3, transport_mode: "noop" });

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["transport_mode"], "noop");
        assert_eq!(json["dispatcher"]["status"], "ready");
    }
}
