use axum::{
    http::{self, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, body: Option<&str>) -> Request<String> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, "Bearer test-key");
    match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .unwrap(),
        None => builder.body(String::new()).unwrap(),
    }
}

/// Routers share their store across clones, so one `app()` is one server.
async fn send(app: &Router, request: Request<String>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn create_account(app: &Router, name: &str) -> Value {
    let body = json!({ "name": name }).to_string();
    let resp = send(app, request("POST", "/accounts", Some(&body))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

// --- auth and routing ---

#[tokio::test]
async fn missing_api_key_returns_401() {
    let app = app();
    let resp = send(
        &app,
        Request::builder().uri("/accounts").body(String::new()).unwrap(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["type"], "invalid_api_key_error");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn unknown_route_returns_api_method_not_found() {
    let app = app();
    let resp = send(&app, request("GET", "/wire_transfers", None)).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["type"], "api_method_not_found_error");
}

// --- validation ---

#[tokio::test]
async fn create_account_requires_name() {
    let app = app();
    let resp = send(&app, request("POST", "/accounts", Some("{}"))).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["type"], "invalid_parameters_error");
    assert_eq!(body["errors"][0], json!({"field": "name", "message": "is required"}));
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let app = app();
    let resp = send(&app, request("POST", "/accounts", Some("{\"name\":"))).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["type"], "malformed_request_error");
}

#[tokio::test]
async fn nested_card_fields_are_reported_with_paths() {
    let app = app();
    let account = create_account(&app, "Cards").await;
    let body = json!({
        "account_id": account["id"],
        "billing_address": {"line1": "33 Liberty Street"},
    })
    .to_string();
    let resp = send(&app, request("POST", "/cards", Some(&body))).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<Value> = body_json(resp).await["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].clone())
        .collect();
    assert_eq!(
        fields,
        vec![
            json!("billing_address.city"),
            json!("billing_address.state"),
            json!("billing_address.postal_code"),
        ]
    );
}

#[tokio::test]
async fn get_missing_account_returns_404() {
    let app = app();
    let resp = send(&app, request("GET", "/accounts/account_missing", None)).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["type"], "object_not_found_error");
}

// --- pagination ---

#[tokio::test]
async fn lists_page_newest_first() {
    let app = app();
    for name in ["first", "second", "third"] {
        create_account(&app, name).await;
    }

    let resp = send(&app, request("GET", "/accounts?limit=2", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    let names: Vec<&str> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["third", "second"]);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let resp = send(&app, request("GET", &format!("/accounts?limit=2&cursor={cursor}"), None)).await;
    let page = body_json(resp).await;
    assert_eq!(page["data"][0]["name"], "first");
    assert!(page["next_cursor"].is_null());
}

#[tokio::test]
async fn limit_out_of_range_is_rejected() {
    let app = app();
    let resp = send(&app, request("GET", "/accounts?limit=101", None)).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["errors"][0]["field"], "limit");
}

// --- idempotency ---

#[tokio::test]
async fn repeated_idempotency_key_replays_response() {
    let app = app();
    let keyed = |body: &str| {
        let mut req = request("POST", "/accounts", Some(body));
        req.headers_mut()
            .insert("Idempotency-Key", http::HeaderValue::from_static("key-1"));
        req
    };

    let first = body_json(send(&app, keyed(r#"{"name":"Once"}"#)).await).await;
    let resp = send(&app, keyed(r#"{"name":"Once"}"#)).await;
    assert_eq!(resp.headers()["idempotent-replayed"], "true");
    let second = body_json(resp).await;
    assert_eq!(first, second);
    assert_eq!(first["idempotency_key"], "key-1");

    let resp = send(&app, keyed(r#"{"name":"Twice"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["type"], "idempotency_key_already_used_error");

    let list = body_json(send(&app, request("GET", "/accounts", None)).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_repeats_of_a_key_create_once() {
    let app = app();
    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let mut req = request("POST", "/accounts", Some(r#"{"name":"Racing"}"#));
                req.headers_mut()
                    .insert("Idempotency-Key", http::HeaderValue::from_static("race-key"));
                send(&app, req).await.status()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for attempt in attempts {
        statuses.push(attempt.await.unwrap());
    }
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses
        .iter()
        .all(|status| *status == StatusCode::OK || *status == StatusCode::CONFLICT));

    let list = body_json(send(&app, request("GET", "/accounts", None)).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn faulted_request_does_not_consume_the_key() {
    let app = app();
    let keyed = || {
        let mut req = request("POST", "/accounts", Some(r#"{"name":"Retried"}"#));
        req.headers_mut()
            .insert("Idempotency-Key", http::HeaderValue::from_static("retry-key"));
        req
    };
    send(
        &app,
        request("POST", "/_mock/faults", Some(r#"{"count":1,"status":503}"#)),
    )
    .await;

    assert_eq!(send(&app, keyed()).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    let resp = send(&app, keyed()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("idempotent-replayed").is_none());
}

// --- fault injection ---

#[tokio::test]
async fn injected_faults_fail_the_next_requests() {
    let app = app();
    let resp = send(
        &app,
        request("POST", "/_mock/faults", Some(r#"{"count":1,"status":429,"retry_after":1}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, request("GET", "/accounts", None)).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()[http::header::RETRY_AFTER], "1");
    assert_eq!(body_json(resp).await["type"], "rate_limited_error");

    let resp = send(&app, request("GET", "/accounts", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- transfers ---

#[tokio::test]
async fn account_transfer_approval_books_transactions() {
    let app = app();
    let source = create_account(&app, "Checking").await;
    let destination = create_account(&app, "Savings").await;
    let body = json!({
        "account_id": source["id"],
        "amount": 2500,
        "description": "Move to savings",
        "destination_account_id": destination["id"],
        "require_approval": true,
    })
    .to_string();

    let transfer = body_json(send(&app, request("POST", "/account_transfers", Some(&body))).await).await;
    assert_eq!(transfer["status"], "pending_approval");
    let id = transfer["id"].as_str().unwrap();

    let resp = send(&app, request("POST", &format!("/account_transfers/{id}/approve"), None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let approved = body_json(resp).await;
    assert_eq!(approved["status"], "complete");
    assert!(approved["approval"]["approved_at"].is_string());

    let resp = send(&app, request("POST", &format!("/account_transfers/{id}/cancel"), None)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["type"], "invalid_operation_error");

    let uri = format!("/transactions?account_id={}", destination["id"].as_str().unwrap());
    let transactions = body_json(send(&app, request("GET", &uri, None)).await).await;
    assert_eq!(transactions["data"][0]["amount"], 2500);
    assert_eq!(transactions["data"][0]["source"]["category"], "account_transfer_intention");

    let uri = format!("/accounts/{}/balance", source["id"].as_str().unwrap());
    let balance = body_json(send(&app, request("GET", &uri, None)).await).await;
    assert_eq!(balance["current_balance"], -2500);
}

#[tokio::test]
async fn ach_transfer_submit_and_return() {
    let app = app();
    let account = create_account(&app, "Operating").await;
    let body = json!({
        "account_id": account["id"],
        "amount": 100,
        "statement_descriptor": "Payroll",
        "account_number": "987654321",
        "routing_number": "101050001",
    })
    .to_string();
    let transfer = body_json(send(&app, request("POST", "/ach_transfers", Some(&body))).await).await;
    assert_eq!(transfer["status"], "pending_submission");
    let id = transfer["id"].as_str().unwrap();

    let submitted = body_json(
        send(&app, request("POST", &format!("/simulations/ach_transfers/{id}/submit"), None)).await,
    )
    .await;
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["submission"]["trace_number"].as_str().unwrap().len(), 15);

    let returned = body_json(
        send(
            &app,
            request(
                "POST",
                &format!("/simulations/ach_transfers/{id}/return"),
                Some(r#"{"reason":"insufficient_fund"}"#),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(returned["status"], "returned");
    assert_eq!(returned["return"]["raw_return_reason_code"], "R01");

    let transactions = body_json(
        send(&app, request("GET", "/transactions?category.in=ach_transfer_return", None)).await,
    )
    .await;
    assert_eq!(transactions["data"].as_array().unwrap().len(), 1);
    assert_eq!(transactions["data"][0]["amount"], 100);
}

#[tokio::test]
async fn ach_routing_number_must_have_nine_digits() {
    let app = app();
    let account = create_account(&app, "Operating").await;
    let body = json!({
        "account_id": account["id"],
        "amount": 100,
        "statement_descriptor": "Payroll",
        "account_number": "987654321",
        "routing_number": "1234",
    })
    .to_string();
    let resp = send(&app, request("POST", "/ach_transfers", Some(&body))).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["errors"][0]["field"], "routing_number");
}

// --- entities ---

#[tokio::test]
async fn entity_lifecycle() {
    let app = app();
    let body = json!({
        "structure": "natural_person",
        "natural_person": {
            "name": "Ian Crease",
            "date_of_birth": "1970-01-31",
            "address": {"line1": "33 Liberty Street", "city": "New York", "state": "NY", "zip": "10045"}
        }
    })
    .to_string();
    let entity = body_json(send(&app, request("POST", "/entities", Some(&body))).await).await;
    assert_eq!(entity["structure"], "natural_person");
    assert!(entity["corporation"].is_null());
    let id = entity["id"].as_str().unwrap();

    let account_body = json!({ "name": "Personal", "entity_id": id }).to_string();
    let account = body_json(send(&app, request("POST", "/accounts", Some(&account_body))).await).await;

    let resp = send(&app, request("POST", &format!("/entities/{id}/archive"), None)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let account_id = account["id"].as_str().unwrap();
    let resp = send(&app, request("POST", &format!("/accounts/{account_id}/close"), None)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, request("POST", &format!("/entities/{id}/archive"), None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "archived");
}

#[tokio::test]
async fn entity_details_must_match_structure() {
    let app = app();
    let body = json!({
        "structure": "trust",
        "corporation": {"name": "National Phonograph Company"}
    })
    .to_string();
    let resp = send(&app, request("POST", "/entities", Some(&body))).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["corporation", "trust"]);
}

// --- cards ---

#[tokio::test]
async fn card_details_match_last4() {
    let app = app();
    let account = create_account(&app, "Cards").await;
    let body = json!({ "account_id": account["id"], "description": "Office" }).to_string();
    let card = body_json(send(&app, request("POST", "/cards", Some(&body))).await).await;
    let id = card["id"].as_str().unwrap();

    let details = body_json(send(&app, request("GET", &format!("/cards/{id}/details"), None)).await).await;
    let pan = details["primary_account_number"].as_str().unwrap();
    assert!(pan.ends_with(card["last4"].as_str().unwrap()));

    let resp = send(
        &app,
        request("PATCH", &format!("/cards/{id}"), Some(r#"{"description":null,"status":"canceled"}"#)),
    )
    .await;
    let updated = body_json(resp).await;
    assert!(updated["description"].is_null());
    assert_eq!(updated["status"], "canceled");

    let resp = send(&app, request("PATCH", &format!("/cards/{id}"), Some(r#"{"status":"active"}"#))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
