pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::simulation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Simulations
        .route(
            "/api/v1/simulations",
            post(handlers::handle_create_simulation),
        )
        .route(
            "/api/v1/simulations/:id",
            get(handlers::handle_get_simulation),
        )
        .route(
            "/api/v1/simulations/:id/session",
            get(handlers::handle_get_session_for_round),
        )
        // Rounds
        .route(
            "/api/v1/simulations/:id/rounds/:index",
            get(handlers::handle_load_round),
        )
        .route(
            "/api/v1/simulations/:id/rounds/:index/start",
            post(handlers::handle_start_round),
        )
        .route(
            "/api/v1/simulations/:id/rounds/:index/restart",
            post(handlers::handle_restart_round),
        )
        // Sessions
        .route(
            "/api/v1/sessions/:id/continue",
            post(handlers::handle_continue_round),
        )
        .route(
            "/api/v1/sessions/:id/complete",
            post(handlers::handle_complete_round),
        )
        .route(
            "/api/v1/sessions/:id/progress",
            patch(handlers::handle_update_progress),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::simulation::generator::tests::ScriptedSource;
    use crate::simulation::orchestrator::tests::orchestrator_with;
    use crate::store::MemoryStore;

    fn app() -> Router {
        let orchestrator = orchestrator_with(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedSource::default()),
        );
        build_router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_round_lifecycle_over_http() {
        let app = app();
        let user_id = uuid::Uuid::new_v4();

        let (status, sim) = send(
            &app,
            Method::POST,
            "/api/v1/simulations",
            Some(json!({
                "user_id": user_id,
                "company_name": "Acme",
                "role_level": "senior",
                "total_minutes": 120,
                "rounds": [
                    {"name": "Coding", "category": "dsa", "difficulty": "medium"},
                    {"name": "Concepts", "category": "theory_and_debugging", "difficulty": "easy"}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let sim_id = sim["id"].as_str().unwrap().to_string();

        let (status, view) = send(
            &app,
            Method::GET,
            &format!("/api/v1/simulations/{sim_id}/rounds/0?user_id={user_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["affordance"], "start");

        let (status, session) = send(
            &app,
            Method::POST,
            &format!("/api/v1/simulations/{sim_id}/rounds/0/start"),
            Some(json!({"user_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["status"], "active");
        assert_eq!(session["problems"][0]["category"], "dsa");
        let session_id = session["id"].as_str().unwrap().to_string();

        let (status, found) = send(
            &app,
            Method::GET,
            &format!("/api/v1/simulations/{sim_id}/session?user_id={user_id}&round_name=Coding"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"], session["id"]);

        let (status, moved) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/sessions/{session_id}/progress"),
            Some(json!({"current_problem_index": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["current_problem_index"], 1);

        let (status, continued) = send(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{session_id}/continue"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(continued["problems"], session["problems"]);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{session_id}/complete"),
            Some(json!({"score": 0.9})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{session_id}/complete"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["retryable"], false);

        let (status, restarted) = send(
            &app,
            Method::POST,
            &format!("/api/v1/simulations/{sim_id}/rounds/0/restart"),
            Some(json!({"user_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(restarted["id"], session["id"]);
        assert_eq!(restarted["current_problem_index"], 0);
    }

    #[tokio::test]
    async fn test_invalid_round_number() {
        let app = app();
        let user_id = uuid::Uuid::new_v4();
        let (_, sim) = send(
            &app,
            Method::POST,
            "/api/v1/simulations",
            Some(json!({
                "user_id": user_id,
                "company_name": "Acme",
                "role_level": "junior",
                "total_minutes": 60,
                "rounds": [{"name": "Coding", "category": "dsa", "difficulty": "easy"}]
            })),
        )
        .await;
        let sim_id = sim["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/v1/simulations/{sim_id}/rounds/3?user_id={user_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Invalid round number"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (status, body) = send(
            &app(),
            Method::POST,
            &format!("/api/v1/sessions/{}/continue", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
