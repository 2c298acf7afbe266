use crate::helpers::{assert_json_message, spawn_app};

#[tokio::test]
async fn me_requires_a_session() {
    let app = spawn_app().await;

    let response = app.get_me().await;

    assert_eq!(401, response.status().as_u16());
    assert!(response.headers().get("x-request-id").is_some());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Unauthorized");
}

#[tokio::test]
async fn an_empty_bearer_token_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/api/v1/me", &app.address))
        .bearer_auth("")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn get_session_without_a_token_returns_null() {
    let app = spawn_app().await;

    let response = app.get("/api/auth/get-session").await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn sign_up_rejects_malformed_bodies_with_400() {
    let app = spawn_app().await;
    let test_cases = vec![
        (
            serde_json::json!({ "name": "Ursula", "email": "not-an-email", "password": "password123" }),
            "invalid email",
        ),
        (
            serde_json::json!({ "name": "", "email": "ursula@example.com", "password": "password123" }),
            "empty name",
        ),
        (
            serde_json::json!({ "name": "Ursula", "email": "ursula@example.com", "password": "short" }),
            "short password",
        ),
        (
            serde_json::json!({ "name": "Ursula", "email": "ursula@example.com" }),
            "missing password",
        ),
    ];

    for (body, description) in test_cases {
        let response = app.post_sign_up(&body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["message"].is_string());
    }
}
