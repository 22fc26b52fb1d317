mod common;

use std::time::Duration;

use tokio::time;

/// Post a notification until the actor reports a delivery, allowing for the
/// socket attach to land.
async fn push_until_delivered(
    addr: std::net::SocketAddr,
    user_id: &str,
    body: &serde_json::Value,
) -> usize {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        let resp = client
            .post(format!("http://{addr}/notify/{user_id}/broadcast-notification"))
            .json(body)
            .send()
            .await
            .expect("post notification");
        assert!(resp.status().is_success());
        let parsed: serde_json::Value = resp.json().await.expect("parse response");
        let delivered = parsed["delivered"].as_u64().unwrap_or_default() as usize;
        if delivered > 0 {
            return delivered;
        }
        time::sleep(Duration::from_millis(50)).await;
    }
    0
}

#[tokio::test]
async fn push_reaches_query_token_socket() {
    let (addr, _ctx) = common::start_server().await;
    let token = common::mint_token("u1", "Uma");
    let mut ws = common::connect_notify(addr, "u1", Some(&token)).await;

    let body = serde_json::json!({
        "type": "task_assigned",
        "payload": { "taskId": "t1", "patient": "bed 4" }
    });
    let delivered = push_until_delivered(addr, "u1", &body).await;
    assert_eq!(delivered, 1);

    // The body is forwarded verbatim.
    let frame = common::next_json(&mut ws).await;
    assert_eq!(frame["type"], "task_assigned");
    assert_eq!(frame["payload"]["taskId"], "t1");
}

#[tokio::test]
async fn push_reaches_frame_authenticated_socket() {
    let (addr, _ctx) = common::start_server().await;
    let mut ws = common::connect_notify(addr, "u2", None).await;

    let token = common::mint_token("u2", "Uri");
    common::send_json(&mut ws, &serde_json::json!({ "type": "auth", "token": token })).await;

    let body = serde_json::json!({ "type": "ping", "payload": {} });
    let delivered = push_until_delivered(addr, "u2", &body).await;
    assert_eq!(delivered, 1);

    let frame = common::next_json(&mut ws).await;
    assert_eq!(frame["type"], "ping");
}

#[tokio::test]
async fn socket_for_another_user_is_rejected() {
    let (addr, _ctx) = common::start_server().await;

    // A valid token, but for the wrong channel owner.
    let token = common::mint_token("mallory", "Mallory");
    let mut ws = common::connect_notify(addr, "u1", Some(&token)).await;

    let error = common::next_json(&mut ws).await;
    assert_eq!(error["error"], "authentication failed");
    let code = common::expect_close(&mut ws, Duration::from_secs(5)).await;
    assert_eq!(code, 4004);
}

#[tokio::test]
async fn auth_frame_for_another_user_is_rejected() {
    let (addr, _ctx) = common::start_server().await;
    let mut ws = common::connect_notify(addr, "u1", None).await;

    let token = common::mint_token("mallory", "Mallory");
    common::send_json(&mut ws, &serde_json::json!({ "type": "auth", "token": token })).await;

    let error = common::next_json(&mut ws).await;
    assert_eq!(error["error"], "authentication failed");
    let code = common::expect_close(&mut ws, Duration::from_secs(5)).await;
    assert_eq!(code, 4004);
}

#[tokio::test]
async fn silent_socket_is_closed_after_the_auth_window() {
    let (addr, _ctx) = common::start_server().await;
    let mut ws = common::connect_notify(addr, "u1", None).await;

    // Send nothing: the 10-second window expires and the socket is closed
    // abnormally.
    let code = common::expect_close(&mut ws, Duration::from_secs(15)).await;
    assert_eq!(code, 4009);
}

#[tokio::test]
async fn pushes_are_not_delivered_to_unauthenticated_sockets() {
    let (addr, _ctx) = common::start_server().await;

    // Connected but never authenticated: the socket never attaches.
    let _ws = common::connect_notify(addr, "u3", None).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/notify/u3/broadcast-notification"))
        .json(&serde_json::json!({ "type": "ping", "payload": {} }))
        .send()
        .await
        .expect("post notification");
    let parsed: serde_json::Value = resp.json().await.expect("parse response");
    assert_eq!(parsed["delivered"], 0);
}
