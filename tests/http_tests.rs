mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::World;
use estimate_workflow::app::build_router;
use estimate_workflow::config::JwtConfig;
use estimate_workflow::middlewares::auth_middleware::AuthState;
use estimate_workflow::model::user::Actor;
use estimate_workflow::service::estimate_service::EstimateService;
use estimate_workflow::util::jwt::{JwtTokenUtils, JwtTokenUtilsImpl};

fn setup_app(world: &World) -> Router {
    let auth_state = Arc::new(AuthState::new(JwtTokenUtilsImpl::new(JwtConfig::default())));
    build_router(world.service.clone(), world.quotations.clone(), auth_state)
}

fn token_for(actor: &Actor) -> String {
    JwtTokenUtilsImpl::new(JwtConfig::default())
        .generate_access_token(&actor.id.to_hex(), "someone@example.com", actor.role.as_str())
        .unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("authorization", format!("Bearer {}", token_for(actor)));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn intake_body(world: &World, email: &str) -> Value {
    json!({
        "customer_name": "Huda Salem",
        "customer_email": email,
        "customer_mobile": "+971 50 123 4567",
        "category": world.category.to_hex(),
        "subcategories": [world.subcategory.to_hex()],
        "description": "Repaint two bedrooms"
    })
}

#[tokio::test]
async fn health_is_public() {
    let world = World::new();
    let app = setup_app(&world);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_intake_creates_pending_estimate() {
    let world = World::new();
    let app = setup_app(&world);
    let (status, body) = send(&app, "POST", "/estimates", None, Some(intake_body(&world, "web@example.com"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["supervisor_progress"], "none");
    assert_eq!(body["data"]["customer_mobile"]["country_code"], "+971");
}

#[tokio::test]
async fn intake_with_bad_token_is_rejected() {
    let world = World::new();
    let app = setup_app(&world);
    let req = Request::builder()
        .method("POST")
        .uri("/estimates")
        .header("authorization", "Bearer not-a-token")
        .header("content-type", "application/json")
        .body(Body::from(intake_body(&world, "web@example.com").to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn intake_validation_errors_use_error_envelope() {
    let world = World::new();
    let app = setup_app(&world);
    let mut body = intake_body(&world, "nope");
    body["customer_name"] = json!("H");
    let (status, body) = send(&app, "POST", "/estimates", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let world = World::new();
    let app = setup_app(&world);
    let (status, body) = send(&app, "GET", "/estimates", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&app, "GET", "/quotations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn transitions_map_errors_to_status_codes() {
    let world = World::new();
    let app = setup_app(&world);
    let estimate = world.submit("codes@example.com").await;
    let id = estimate.id.to_hex();
    let assign = json!({ "supervisor_id": world.supervisor.id.to_hex() });

    let (status, _) = send(&app, "POST", &format!("/estimates/{}/assign", id), Some(&world.supervisor), Some(assign.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", &format!("/estimates/{}/assign", id), Some(&world.superadmin), Some(assign)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "assigned");

    let (status, body) = send(&app, "POST", &format!("/estimates/{}/approve", id), Some(&world.superadmin), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "PreconditionFailed");

    let (status, _) = send(&app, "GET", "/estimates/not-an-id", Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = bson::oid::ObjectId::new().to_hex();
    let (status, _) = send(&app, "GET", &format!("/estimates/{}", missing), Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn freelancer_submits_quotation_over_http() {
    let world = World::new();
    let app = setup_app(&world);
    let estimate = world.submit("http-quote@example.com").await;
    let id = estimate.id.to_hex();
    world
        .service
        .assign_supervisor(estimate.id, world.supervisor.id, &world.superadmin)
        .await
        .unwrap();

    let dispatch = json!({ "freelancer_ids": [world.freelancers[0].id.to_hex()] });
    let (status, _) = send(&app, "POST", &format!("/estimates/{}/dispatch", id), Some(&world.supervisor), Some(dispatch)).await;
    assert_eq!(status, StatusCode::OK);

    let quotation = json!({
        "scope_of_work": "Walls",
        "items": [{"item": "Paint", "unit": "sqft", "quantity": 100, "unit_price": 5, "total": 99999}],
        "discount_percent": 10
    });
    let (status, body) = send(&app, "POST", &format!("/estimates/{}/quotations", id), Some(&world.freelancers[0]), Some(quotation.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["quotation"]["items"][0]["total"], 500.0);
    assert_eq!(body["data"]["quotation"]["grand_total"], 450.0);
    assert_eq!(body["data"]["estimate"]["supervisor_progress"], "request_completed");

    let (status, body) = send(&app, "POST", &format!("/estimates/{}/quotations", id), Some(&world.freelancers[0]), Some(quotation)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"], "DUPLICATE_SUBMISSION");

    let (status, body) = send(&app, "GET", "/quotations", Some(&world.freelancers[0]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn second_conversion_reports_already_converted() {
    let world = World::new();
    let app = setup_app(&world);
    let estimate = world.accepted("http-deal@example.com").await;
    let uri = format!("/estimates/{}/convert", estimate.id.to_hex());

    let (status, body) = send(&app, "POST", &uri, Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["estimate"]["status"], "deal");
    assert_eq!(body["data"]["lead"]["amount"], 450.0);
    assert!(body["data"]["mortgage"].is_null());

    let (status, body) = send(&app, "POST", &uri, Some(&world.superadmin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"], "ALREADY_CONVERTED");
}

#[tokio::test]
async fn cancel_accepts_empty_body() {
    let world = World::new();
    let app = setup_app(&world);
    let first = world.submit("cancel-1@example.com").await;
    let second = world.submit("cancel-2@example.com").await;

    let (status, body) = send(&app, "POST", &format!("/estimates/{}/cancel", first.id.to_hex()), Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/estimates/{}/cancel", second.id.to_hex()),
        Some(&world.admin),
        Some(json!({ "reason": "Duplicate request" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cancel_reason"], "Duplicate request");
}

#[tokio::test]
async fn customer_token_scopes_listing() {
    let world = World::new();
    let app = setup_app(&world);
    let mine = world.submit("me@example.com").await;
    world.submit("you@example.com").await;

    let (status, body) = send(&app, "GET", "/estimates", Some(&World::customer_of(&mine)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["_id"]["$oid"], mine.id.to_hex());

    let (status, body) = send(&app, "GET", "/estimates?status=pending&limit=1", Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_bodies_use_error_envelope() {
    let world = World::new();
    let app = setup_app(&world);
    let estimate = world.approved("envelope@example.com").await;
    let customer = World::customer_of(&estimate);
    let uri = format!("/estimates/{}/response", estimate.id.to_hex());

    let (status, body) = send(&app, "POST", &uri, Some(&customer), Some(json!({ "status": "maybe" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "BadRequest");
    assert!(body["message"].as_str().unwrap().contains("maybe"));

    let req = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("authorization", format!("Bearer {}", token_for(&customer)))
        .header("content-type", "application/json")
        .body(Body::from("{\"status\":"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "BadRequest");

    let (status, body) = send(&app, "GET", "/estimates?limit=lots", Some(&world.admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Nothing was recorded
    let current = world.service.get_estimate(estimate.id, &world.admin).await.unwrap();
    assert!(current.customer_response.status.is_none());
}
