use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{assert_json_message, spawn_app, spawn_app_with_database, TestApp};

fn sign_up_body() -> serde_json::Value {
    serde_json::json!({
        "name": "Ursula Le Guin",
        "email": "ursula_le_guin@gmail.com",
        "password": "everything-1",
    })
}

fn sign_in_body(password: &str) -> serde_json::Value {
    serde_json::json!({
        "email": "ursula_le_guin@gmail.com",
        "password": password,
    })
}

async fn mount_email_api(app: &TestApp) {
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "1" })))
        .mount(&app.email_server)
        .await;
}

async fn last_email(app: &TestApp) -> wiremock::Request {
    app.email_server
        .received_requests()
        .await
        .unwrap()
        .pop()
        .expect("no email was sent")
}

async fn sign_up_and_verify(app: &TestApp) {
    let response = app.post_sign_up(&sign_up_body()).await;
    assert_eq!(200, response.status().as_u16());

    let link = app.get_email_link(&last_email(app).await, true);
    let response = app
        .api_client
        .get(link)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], true);
}

#[tokio::test]
async fn request_password_reset_with_an_invalid_email_still_succeeds() {
    let app = spawn_app().await;

    let response = app
        .post_json(
            "/api/auth/request-password-reset",
            &serde_json::json!({ "email": "definitely not an email" }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], true);
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn sign_up_returns_the_user_and_sends_a_verification_email() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;

    let response = app.post_sign_up(&sign_up_body()).await;

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["token"].is_null());
    assert_eq!(body["user"]["email"], "ursula_le_guin@gmail.com");
    assert_eq!(body["user"]["emailVerified"], false);

    let link = app.get_email_link(&last_email(&app).await, true);
    assert_eq!(link.path(), "/api/auth/verify-email");
    assert!(link.query_pairs().any(|(key, _)| key == "token"));
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn signing_up_twice_returns_422() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;

    app.post_sign_up(&sign_up_body()).await;
    let response = app.post_sign_up(&sign_up_body()).await;

    assert_eq!(422, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "User already exists");
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn an_unknown_verification_token_is_rejected_with_401() {
    let app = spawn_app_with_database().await;

    let response = app.get("/api/auth/verify-email?token=unknown").await;

    assert_eq!(401, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Invalid token");
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn signing_in_before_verifying_returns_403_and_resends_the_email() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;
    app.post_sign_up(&sign_up_body()).await;

    let response = app.post_sign_in(&sign_in_body("everything-1")).await;

    assert_eq!(403, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Email not verified");
    assert_eq!(app.email_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn a_wrong_password_is_rejected_with_401() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;
    sign_up_and_verify(&app).await;

    let response = app.post_sign_in(&sign_in_body("not-the-password")).await;

    assert_eq!(401, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Invalid email or password");
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn a_session_grants_access_until_sign_out() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;
    sign_up_and_verify(&app).await;

    // Sign in, the cookie store keeps the session cookie
    let response = app.post_sign_in(&sign_in_body("everything-1")).await;
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_owned();
    assert_eq!(body["user"]["emailVerified"], true);

    let response = app.get_me().await;
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], "ursula_le_guin@gmail.com");

    // The same token works as a bearer token
    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/me", &app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = app.get("/api/auth/get-session").await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["session"]["expiresAt"].is_string());

    let response = app.post_json("/api/auth/sign-out", &serde_json::json!({})).await;
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/me", &app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn resetting_the_password_replaces_the_old_one() {
    let app = spawn_app_with_database().await;
    mount_email_api(&app).await;
    sign_up_and_verify(&app).await;

    let response = app
        .post_json(
            "/api/auth/request-password-reset",
            &serde_json::json!({ "email": "ursula_le_guin@gmail.com" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    let link = app.get_email_link(&last_email(&app).await, false);
    assert!(link.as_str().starts_with(&app.settings.auth.reset_password_url));
    let token = link
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .expect("the reset link has no token");

    let response = app
        .post_json(
            "/api/auth/reset-password",
            &serde_json::json!({ "token": token, "newPassword": "everything-2" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    // The token is single use
    let response = app
        .post_json(
            "/api/auth/reset-password",
            &serde_json::json!({ "token": token, "newPassword": "everything-3" }),
        )
        .await;
    assert_eq!(400, response.status().as_u16());

    let response = app.post_sign_in(&sign_in_body("everything-1")).await;
    assert_eq!(401, response.status().as_u16());
    let response = app.post_sign_in(&sign_in_body("everything-2")).await;
    assert_eq!(200, response.status().as_u16());
}
