use std::time::Duration;

use crate::helpers::spawn_app;

#[tokio::test]
async fn graceful_shutdown_exits_with_zero_and_stops_the_server() {
    let app = spawn_app().await;
    assert_eq!(200, app.get("/health").await.status().as_u16());

    let code = app.shutdown.clone().run("SIGTERM").await;

    assert_eq!(code, 0);
    let outcome = reqwest::Client::new()
        .get(&format!("{}/health", &app.address))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(outcome.is_err(), "the server still answers after shutdown");
}

#[tokio::test]
async fn shutdown_past_the_deadline_exits_with_one() {
    let app = spawn_app().await;

    let code = app
        .shutdown
        .clone()
        .with_timeout(Duration::ZERO)
        .run("SIGINT")
        .await;

    assert_eq!(code, 1);
}
