use crate::helpers::{assert_json_message, spawn_app};

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app.get("/health").await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Healthy");
    let time = body["time"].as_str().unwrap();
    // e.g. "Thu Mar 07 2024"
    assert_eq!(time.split(' ').count(), 4, "unexpected time: {}", time);
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = spawn_app().await;

    let response = app.get("/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id")
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn an_incoming_request_id_is_echoed_back() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/health", &app.address))
        .header("x-request-id", "client-chosen-id")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "client-chosen-id"
    );
}

#[tokio::test]
async fn security_headers_are_set() {
    let app = spawn_app().await;

    let response = app.get("/health").await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert!(headers.get("content-security-policy").is_some());
    assert!(headers.get("strict-transport-security").is_some());
}

#[tokio::test]
async fn unknown_routes_return_a_json_404() {
    let app = spawn_app().await;

    let response = app.get("/does-not-exist").await;

    assert_eq!(404, response.status().as_u16());
    assert!(response.headers().get("x-request-id").is_some());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Not Found");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .request(
            reqwest::Method::OPTIONS,
            &format!("{}/api/auth/sign-in/email", &app.address),
        )
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_some());
}
