//! Project lifecycle against a scripted backend

mod common;

use brms_reconciler::client::ApiResponse;
use brms_reconciler::model::{ProjectSpec, ProjectState, ResourceKind};
use brms_reconciler::{EngineError, Phase, ReadOutcome, Reconciler, TrackedResource};
use common::{engine, json, ScriptedTransport};
use reqwest::Method;
use serde_json::json;

fn desired() -> ProjectSpec {
    ProjectSpec {
        name: "Pricing".to_string(),
        key: "pricing".to_string(),
        protected: None,
        copy_content_ref: Some("template-1".to_string()),
    }
}

fn tracked() -> ProjectState {
    ProjectState {
        id: "p1".to_string(),
        name: "Pricing".to_string(),
        key: "pricing".to_string(),
        protected: true,
        copy_content_ref: Some("template-1".to_string()),
    }
}

#[tokio::test]
async fn test_create_hydrates_from_item_endpoint() {
    let backend = ScriptedTransport::new();
    backend
        .on_json(
            Method::POST,
            "/api/projects",
            201,
            json!({"id": "p1", "name": "Pricing", "key": "pricing"}),
        )
        .on_json(
            Method::GET,
            "/api/projects/p1",
            200,
            json!({"project": {"id": "p1", "name": "Pricing", "key": "pricing", "protected": true}}),
        );

    let applied = engine(&backend).projects().create(&desired()).await.unwrap();

    assert!(applied.warnings.is_empty());
    assert_eq!(applied.state, tracked());
    assert_eq!(
        backend.last_body(&Method::POST, "/api/projects"),
        Some(json!({"name": "Pricing", "key": "pricing", "copyContentRef": "template-1"}))
    );
}

#[tokio::test]
async fn test_create_takes_identifier_from_location() {
    let backend = ScriptedTransport::new();
    backend
        .on(
            Method::POST,
            "/api/projects",
            ApiResponse::new(201, "").with_location("https://brms.test/api/projects/p9"),
        )
        .on_json(
            Method::GET,
            "/api/projects/p9",
            200,
            json!({"id": "p9", "name": "Pricing", "key": "pricing"}),
        );

    let applied = engine(&backend).projects().create(&desired()).await.unwrap();

    assert_eq!(applied.state.id, "p9");
    assert!(!applied.state.protected);
    assert!(applied.warnings.is_empty());
}

#[tokio::test]
async fn test_create_unparseable_body_rescued_by_location_warns() {
    let backend = ScriptedTransport::new();
    backend
        .on(
            Method::POST,
            "/api/projects",
            ApiResponse::new(201, "<html>created</html>").with_location("/api/projects/p2"),
        )
        .on(Method::GET, "/api/projects/p2", ApiResponse::new(503, "busy"));

    let applied = engine(&backend).projects().create(&desired()).await.unwrap();

    assert_eq!(applied.state.id, "p2");
    assert_eq!(applied.state.name, "Pricing");
    assert_eq!(applied.warnings.len(), 2);
}

#[tokio::test]
async fn test_create_without_identifier_fails() {
    let backend = ScriptedTransport::new();
    backend.on_json(Method::POST, "/api/projects", 201, json!({"name": "Pricing"}));

    let err = engine(&backend).projects().create(&desired()).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::MissingIdentifier {
            kind: ResourceKind::Project
        }
    ));
}

#[tokio::test]
async fn test_create_redirect_is_rejected() {
    let backend = ScriptedTransport::new();
    backend.on(
        Method::POST,
        "/api/projects",
        ApiResponse::new(302, "").with_location("https://login.brms.test"),
    );

    let err = engine(&backend).projects().create(&desired()).await.unwrap_err();

    assert!(matches!(err, EngineError::BackendRejected { status: 302, .. }));
    assert_eq!(backend.count(&Method::GET, "/api/projects/p1"), 0);
}

#[tokio::test]
async fn test_invalid_key_fails_before_any_request() {
    let backend = ScriptedTransport::new();
    let mut spec = desired();
    spec.key = "Not A Key".to_string();

    let err = engine(&backend).projects().create(&spec).await.unwrap_err();

    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_read_server_error_preserves_tracked_record() {
    let backend = ScriptedTransport::new();
    backend.on(Method::GET, "/api/projects/p1", ApiResponse::new(503, "maintenance"));

    let mut state = TrackedResource::desired(ResourceKind::Project);
    state.apply(brms_reconciler::Applied {
        state: tracked(),
        warnings: Vec::new(),
    });
    let outcome = engine(&backend).projects().read(&tracked()).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::Preserved(_)));

    let warnings = state.apply_read(outcome);
    assert_eq!(warnings.len(), 1);
    assert_eq!(state.phase, Phase::Managed);
    assert_eq!(state.managed(), Some(&tracked()));
}

#[tokio::test]
async fn test_read_redirect_and_garbage_preserve() {
    let backend = ScriptedTransport::new();
    backend
        .on(
            Method::GET,
            "/api/projects/p1",
            ApiResponse::new(301, "").with_location("/elsewhere"),
        )
        .on(Method::GET, "/api/projects/p1", ApiResponse::new(200, "not json"));
    let projects = engine(&backend).projects();

    assert!(matches!(
        projects.read(&tracked()).await.unwrap(),
        ReadOutcome::Preserved(_)
    ));
    assert!(matches!(
        projects.read(&tracked()).await.unwrap(),
        ReadOutcome::Preserved(_)
    ));
}

#[tokio::test]
async fn test_read_not_found_removes() {
    let backend = ScriptedTransport::new();
    backend.on(Method::GET, "/api/projects/p1", ApiResponse::new(404, ""));

    let outcome = engine(&backend).projects().read(&tracked()).await.unwrap();

    assert_eq!(outcome, ReadOutcome::Removed);
}

#[tokio::test]
async fn test_read_refreshes_drifted_fields() {
    let backend = ScriptedTransport::new();
    backend.on_json(
        Method::GET,
        "/api/projects/p1",
        200,
        json!({"id": "p1", "name": "Pricing Engine", "key": "pricing", "protected": null}),
    );

    let ReadOutcome::Refreshed(applied) =
        engine(&backend).projects().read(&tracked()).await.unwrap()
    else {
        panic!("expected a refreshed record");
    };

    assert_eq!(applied.state.name, "Pricing Engine");
    assert!(applied.state.protected);
    assert_eq!(applied.state.copy_content_ref.as_deref(), Some("template-1"));
}

#[tokio::test]
async fn test_update_retries_once_on_unauthorized() {
    let backend = ScriptedTransport::new();
    backend
        .on(Method::PUT, "/api/projects/p1", ApiResponse::new(401, ""))
        .on_json(
            Method::PUT,
            "/api/projects/p1",
            200,
            json!({"id": "p1", "name": "Pricing", "key": "pricing", "protected": true}),
        );

    let applied = engine(&backend)
        .projects()
        .update(&tracked(), &desired())
        .await
        .unwrap();

    assert_eq!(backend.count(&Method::PUT, "/api/projects/p1"), 2);
    assert_eq!(applied.state, tracked());
}

#[tokio::test]
async fn test_update_gives_up_after_second_unauthorized() {
    let backend = ScriptedTransport::new();
    backend.on(Method::PUT, "/api/projects/p1", ApiResponse::new(401, "expired"));

    let err = engine(&backend)
        .projects()
        .update(&tracked(), &desired())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::BackendRejected { status: 401, .. }));
    assert_eq!(backend.count(&Method::PUT, "/api/projects/p1"), 2);
}

#[tokio::test]
async fn test_update_redirect_is_an_error() {
    let backend = ScriptedTransport::new();
    backend.on(
        Method::PUT,
        "/api/projects/p1",
        ApiResponse::new(307, "").with_location("/api/v2/projects/p1"),
    );

    let err = engine(&backend)
        .projects()
        .update(&tracked(), &desired())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::BackendRejected { status: 307, .. }));
    assert_eq!(backend.count(&Method::PUT, "/api/projects/p1"), 1);
}

#[tokio::test]
async fn test_update_keeps_prior_protection_and_never_sends_template() {
    let backend = ScriptedTransport::new();
    backend.on(Method::PUT, "/api/projects/p1", ApiResponse::new(204, ""));

    let applied = engine(&backend)
        .projects()
        .update(&tracked(), &desired())
        .await
        .unwrap();

    assert_eq!(
        backend.last_body(&Method::PUT, "/api/projects/p1"),
        Some(json!({"name": "Pricing", "key": "pricing", "protected": true}))
    );
    assert_eq!(applied.state.id, "p1");
    assert!(applied.state.protected);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let backend = ScriptedTransport::new();
    backend
        .on(Method::DELETE, "/api/projects/p1", ApiResponse::new(204, ""))
        .on(Method::DELETE, "/api/projects/p1", ApiResponse::new(404, ""));
    let projects = engine(&backend).projects();

    projects.delete(&tracked()).await.unwrap();
    projects.delete(&tracked()).await.unwrap();

    assert_eq!(backend.count(&Method::DELETE, "/api/projects/p1"), 2);
}

#[tokio::test]
async fn test_delete_recovers_from_network_failure() {
    let backend = ScriptedTransport::new();
    backend
        .on_network_error(Method::DELETE, "/api/projects/p1")
        .on(Method::DELETE, "/api/projects/p1", ApiResponse::new(200, ""));

    engine(&backend).projects().delete(&tracked()).await.unwrap();

    assert_eq!(backend.count(&Method::DELETE, "/api/projects/p1"), 2);
}

#[tokio::test]
async fn test_delete_reports_last_failure_when_exhausted() {
    let backend = ScriptedTransport::new();
    backend.on(
        Method::DELETE,
        "/api/projects/p1",
        json(500, &json!({"error": "locked"})),
    );

    let err = engine(&backend).projects().delete(&tracked()).await.unwrap_err();

    match err {
        EngineError::RetryExhausted {
            attempts,
            status,
            body,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(status, 500);
            assert!(body.contains("locked"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.count(&Method::DELETE, "/api/projects/p1"), 3);
}
