use crate::helpers::{assert_json_message, spawn_app_with_rate_limit};

#[tokio::test]
#[ignore = "requires redis"]
async fn requests_over_the_limit_get_429_with_quota_headers() {
    let limit = 3;
    let app = spawn_app_with_rate_limit(limit).await;

    // Routes outside `/api/v1` are neither counted nor annotated.
    for _ in 0..limit + 1 {
        let response = app.get("/health").await;
        assert_eq!(200, response.status().as_u16());
        assert!(response.headers().get("ratelimit").is_none());
    }

    // Requests within the quota reach the session check and are turned
    // away there, still advertising the quota.
    for used in 1..=limit {
        let response = app.get_me().await;

        assert_eq!(401, response.status().as_u16());
        let headers = response.headers();
        assert_eq!(
            headers.get("ratelimit-policy").unwrap(),
            "\"3-in-60sec\"; q=3; w=60"
        );
        let state = headers.get("ratelimit").unwrap().to_str().unwrap();
        assert!(
            state.starts_with(&format!("\"3-in-60sec\"; r={}; t=", limit - used)),
            "unexpected RateLimit header: {}",
            state
        );
    }

    let response = app.get_me().await;

    assert_eq!(429, response.status().as_u16());
    let headers = response.headers();
    assert_eq!(
        headers.get("ratelimit-policy").unwrap(),
        "\"3-in-60sec\"; q=3; w=60"
    );
    assert!(headers
        .get("ratelimit")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("\"3-in-60sec\"; r=0; t="));
    assert!(headers.get("x-request-id").is_some());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_json_message(&body, "Too Many Requests");
}
