//! Integration tests for the HTTP server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use model::{
    CustomerId, Entity, EventMessage, Mutation, ParkingSpace, Seq, SpaceId, StoreVersion, Vehicle,
    VehicleId, ZoneId,
};
use store::{InMemoryStore, Store};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<InMemoryStore>, server::Pipeline<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let (state, pipeline) = server::create_state(Arc::clone(&store), 2);
    let app = server::create_app(state, get_metrics_handle());
    (app, store, pipeline)
}

fn space_event(id: &str, zone: &str, occupied: bool) -> EventMessage {
    EventMessage::new(
        Seq::new(1),
        Mutation::Upsert(Entity::Space(ParkingSpace {
            id: SpaceId::new(id),
            zone: ZoneId::new(zone),
            occupied,
            hourly_rate_cents: 150,
            max_minutes: 120,
        })),
    )
}

async fn post_event(app: &axum::Router, event: &EventMessage) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(event).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

async fn wait_for_version(store: &InMemoryStore, version: StoreVersion) {
    for _ in 0..200 {
        if store.current_version().await.unwrap() >= version {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store never reached version {version}");
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, store, _pipeline) = setup();
    store.apply(&space_event("S-1", "Z-A", false)).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_version"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store, _pipeline) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_posted_event_becomes_queryable() {
    let (app, store, _pipeline) = setup();

    let status = post_event(&app, &space_event("S-1", "Z-A", false)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_version(&store, StoreVersion::new(1)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/entities?kind=space")
                .header("x-staff", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["version"], 1);
    assert_eq!(json["items"][0]["record"]["id"], "S-1");
}

#[tokio::test]
async fn test_entities_requires_caller_identity() {
    let (app, _store, _pipeline) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/entities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_scope_hides_foreign_vehicles() {
    let (app, store, _pipeline) = setup();
    let me = CustomerId::new();
    let other = CustomerId::new();

    let mine = EventMessage::new(
        Seq::new(1),
        Mutation::Upsert(Entity::Vehicle(Vehicle {
            id: VehicleId::new("V-MINE"),
            customer: me,
        })),
    );
    let theirs = EventMessage::new(
        Seq::new(1),
        Mutation::Upsert(Entity::Vehicle(Vehicle {
            id: VehicleId::new("V-THEIRS"),
            customer: other,
        })),
    );
    store.apply(&mine).await.unwrap();
    store.apply(&theirs).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/entities?kind=vehicle")
                .header("x-customer-id", me.as_uuid().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["record"]["id"], "V-MINE");
}

#[tokio::test]
async fn test_unknown_entity_kind_is_rejected() {
    let (app, _store, _pipeline) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/entities?kind=starship")
                .header("x-staff", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_before_recompute_are_empty_and_stale() {
    let (app, store, _pipeline) = setup();
    store.apply(&space_event("S-1", "Z-A", false)).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/recommendations/Z-A")
                .header("x-staff", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["stale"], true);
    assert_eq!(json["record"]["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_recompute_flow_over_http() {
    let (app, store, _pipeline) = setup();
    store.apply(&space_event("S-1", "Z-A", false)).await.unwrap();
    store.apply(&space_event("S-2", "Z-A", true)).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/recompute")
                .header("x-staff", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Poll status until the background recompute completes.
    let mut completed = false;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/recompute/status")
                    .header("x-staff", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        if json["state"] == "completed" {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(completed, "recompute never completed");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/recommendations/Z-A?limit=5")
                .header("x-staff", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["stale"], false);
    let entries = json["record"]["entries"].as_array().unwrap();
    // Only the free space is recommended.
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["space"], "S-1");
}

#[tokio::test]
async fn test_recompute_is_staff_only() {
    let (app, _store, _pipeline) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/recompute")
                .header("x-customer-id", CustomerId::new().as_uuid().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_event_is_accepted_then_dropped() {
    let (app, store, _pipeline) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Give the workers a moment; the payload must be rejected, not applied.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.current_version().await.unwrap(), StoreVersion::zero());
}

#[tokio::test]
async fn test_empty_event_payload_is_rejected() {
    let (app, _store, _pipeline) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_posted_events_apply_once() {
    let (app, store, _pipeline) = setup();

    let event = space_event("S-1", "Z-A", false);
    assert_eq!(post_event(&app, &event).await, StatusCode::ACCEPTED);
    assert_eq!(post_event(&app, &event).await, StatusCode::ACCEPTED);
    wait_for_version(&store, StoreVersion::new(1)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.current_version().await.unwrap(), StoreVersion::new(1));
    assert_eq!(store.entity_count().await, 1);
}
