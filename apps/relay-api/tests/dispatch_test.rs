mod common;

use common::TEST_DISPATCH_KEY;
use relay_api::dispatch::DISPATCH_KEY_HEADER;

#[tokio::test]
async fn dispatch_requires_the_internal_key() {
    let (addr, _ctx) = common::start_server().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "notification": { "message": "code blue", "createdBy": { "id": "sys" } },
        "recipients": ["u1"]
    });

    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .json(&body)
        .send()
        .await
        .expect("post without key");
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .header(DISPATCH_KEY_HEADER, "wrong")
        .json(&body)
        .send()
        .await
        .expect("post with wrong key");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn dispatch_targets_channel_room_and_recipient() {
    let (addr, _ctx) = common::start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .header(DISPATCH_KEY_HEADER, TEST_DISPATCH_KEY)
        .json(&serde_json::json!({
            "notification": { "message": "code blue", "createdBy": { "id": "sys" } },
            "recipients": ["u1"],
            "originalRecipients": ["channel:general"]
        }))
        .send()
        .await
        .expect("post dispatch");
    assert_eq!(resp.status(), 202);

    let body: serde_json::Value = resp.json().await.expect("parse response");
    let results = body["results"].as_array().unwrap();
    // Exactly one room dispatch (general) and one user dispatch (u1).
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["kind"], "room");
    assert_eq!(results[0]["target"], "general");
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["kind"], "user");
    assert_eq!(results[1]["target"], "u1");
    assert_eq!(results[1]["ok"], true);
}

#[tokio::test]
async fn dispatch_without_original_recipients_targets_self_rooms() {
    let (addr, _ctx) = common::start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .header(DISPATCH_KEY_HEADER, TEST_DISPATCH_KEY)
        .json(&serde_json::json!({
            "notification": { "message": "lab ready", "createdBy": { "id": "sys" } },
            "recipients": ["u1", "u2"]
        }))
        .send()
        .await
        .expect("post dispatch");
    assert_eq!(resp.status(), 202);

    let body: serde_json::Value = resp.json().await.expect("parse response");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);

    let rooms: Vec<&str> = results
        .iter()
        .filter(|r| r["kind"] == "room")
        .map(|r| r["target"].as_str().unwrap())
        .collect();
    assert_eq!(rooms, vec!["u1-u1", "u2-u2"]);

    let users: Vec<&str> = results
        .iter()
        .filter(|r| r["kind"] == "user")
        .map(|r| r["target"].as_str().unwrap())
        .collect();
    assert_eq!(users, vec!["u1", "u2"]);
}

#[tokio::test]
async fn dispatched_alert_reaches_room_sockets() {
    let (addr, _ctx) = common::start_server().await;

    // A nurse sits in the "general" channel room.
    let token = common::mint_token("nurse-1", "Nurse Nina");
    let mut ws = common::connect_room(addr, "general", Some(&token)).await;
    common::next_json(&mut ws).await; // messages
    common::next_json(&mut ws).await; // presence

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .header(DISPATCH_KEY_HEADER, TEST_DISPATCH_KEY)
        .json(&serde_json::json!({
            "notification": { "message": "bed 4 alarm", "createdBy": { "id": "sys" } },
            "recipients": [],
            "originalRecipients": ["channel:general"]
        }))
        .send()
        .await
        .expect("post dispatch");
    assert_eq!(resp.status(), 202);

    let frame = common::next_json(&mut ws).await;
    assert_eq!(frame["type"], "alert_notification");
    assert_eq!(frame["alert"]["message"], "bed 4 alarm");
}

#[tokio::test]
async fn dispatch_rejects_malformed_notification() {
    let (addr, _ctx) = common::start_server().await;
    let client = reqwest::Client::new();

    // createdBy.id is mandatory on the envelope.
    let resp = client
        .post(format!("http://{addr}/broadcast-alert"))
        .header(DISPATCH_KEY_HEADER, TEST_DISPATCH_KEY)
        .json(&serde_json::json!({
            "notification": { "message": "code blue", "createdBy": {} },
            "recipients": ["u1"]
        }))
        .send()
        .await
        .expect("post dispatch");
    assert!(resp.status().is_client_error());
}
