mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn empty_account_gets_a_live_dashboard() {
    let app = TestApp::new();
    let token = app.register("empty-dash@example.com").await;

    let (status, body) = app.get("/api/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["source"], "live");
    assert_eq!(data["financialSummary"]["annualIncome"], 0.0);
    assert_eq!(data["taxInsights"]["hasTaxInputs"], false);
    assert_eq!(data["taxInsights"]["section80cRemaining"], 150000.0);
    assert_eq!(data["creditInsights"]["scoreBand"], "unknown");
    assert_eq!(data["documentInsights"]["total"], 0);
    assert_eq!(data["agentHealth"]["status"], "healthy");
    assert_eq!(data["agentHealth"]["taxAgentReady"], true);
}

#[tokio::test]
async fn unreachable_agents_do_not_fail_the_dashboard() {
    let app = TestApp::new();
    let token = app.register("down@example.com").await;
    app.gateway.fail_health.store(true, Ordering::SeqCst);

    let (status, body) = app.get("/api/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["agentHealth"]["status"], "unavailable");
    assert_eq!(body["data"]["agentHealth"]["taxAgentReady"], false);
    assert!(body["data"]["agentHealth"]["error"].is_string());

    let (status, _) = app.get("/api/agents/health", &token).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn one_active_snapshot_at_a_time() {
    let app = TestApp::new();
    let token = app.register("snapshots@example.com").await;

    for _ in 0..3 {
        let (status, body) = app.post("/api/dashboard/snapshots", &token, json!({})).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["isActive"], true);
    }

    let (status, body) = app.get("/api/dashboard/snapshots", &token).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    let active: Vec<&Value> = items.iter().filter(|s| s["isActive"] == true).collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn snapshot_is_served_until_refresh() {
    let app = TestApp::new();
    let token = app.register("refresh@example.com").await;

    app.post("/api/dashboard/snapshots", &token, json!({})).await;
    app.upload_csv(&token, "statement.csv").await;

    let (_, body) = app.get("/api/dashboard", &token).await;
    assert_eq!(body["data"]["source"], "snapshot");
    assert_eq!(body["data"]["documentInsights"]["total"], 0);

    let (_, body) = app.get("/api/dashboard?refresh=true", &token).await;
    assert_eq!(body["data"]["source"], "live");
    assert_eq!(body["data"]["documentInsights"]["total"], 1);
    assert_eq!(body["data"]["documentInsights"]["byType"]["bank_statement"], 1);
}

#[tokio::test]
async fn agents_health_is_relayed() {
    let app = TestApp::new();
    let token = app.register("agents@example.com").await;

    let (status, body) = app.get("/api/agents/health", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["agents"]["cibil_agent_ready"], true);
}

#[tokio::test]
async fn chat_is_forwarded_with_the_caller_id() {
    let app = TestApp::new();
    let token = app.register("chat@example.com").await;

    let (status, body) = app
        .post(
            "/api/chat",
            &token,
            json!({"message": "How much can I still invest under 80C?", "sessionId": "abc"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["queryType"], "tax");
    assert_eq!(body["data"]["agentsUsed"], json!(["tax_agent"]));

    let (_, profile) = app.get("/api/user/profile", &token).await;
    let sent = app.gateway.chat_requests.lock().unwrap().clone();
    assert_eq!(sent[0].user_id, profile["data"]["id"].as_str().unwrap());
    assert_eq!(sent[0].session_id.as_deref(), Some("abc"));

    let (status, _) = app.post("/api/chat", &token, json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/chat/history", &token).await;
    assert_eq!(body["data"]["totalMessages"], 2);
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["sessionId"], "abc");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["queryType"], "tax");
}

#[tokio::test]
async fn chat_history_belongs_to_its_owner() {
    let app = TestApp::new();
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    app.post("/api/chat", &alice, json!({"message": "my PAN is ABCDE1234F"}))
        .await;
    app.post("/api/chat", &bob, json!({"message": "what is 80D?"}))
        .await;

    let (status, body) = app.get("/api/chat/history", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalMessages"], 2);
    assert!(!body.to_string().contains("ABCDE1234F"));

    let (status, body) = app.delete("/api/chat/history", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], 2);

    let (_, body) = app.get("/api/chat/history", &bob).await;
    assert_eq!(body["data"]["totalMessages"], 0);
    let (_, body) = app.get("/api/chat/history", &alice).await;
    assert_eq!(body["data"]["totalMessages"], 2);
    assert_eq!(body["data"]["messages"][0]["content"], "my PAN is ABCDE1234F");

    let (_, body) = app.get("/api/chat/history?limit=1", &alice).await;
    assert_eq!(body["data"]["messages"][0]["role"], "assistant");
    let (status, _) = app.get("/api/chat/history?limit=0", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn insights_include_the_live_dashboard() {
    let app = TestApp::new();
    let token = app.register("insights@example.com").await;
    app.post("/api/tax-inputs", &token, json!({"annualIncome": 1100000}))
        .await;

    let (status, body) = app
        .post("/api/chat/insights", &token, json!({"focusAreas": ["tax"]}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["focusAreas"], json!(["tax"]));

    let sent = app.gateway.insight_requests.lock().unwrap().clone();
    assert_eq!(
        sent[0].user_data["financialSummary"]["annualIncome"],
        1100000.0
    );

    let (status, body) = app.get("/api/chat/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalMessages"], 0);

    let (status, body) = app.delete("/api/chat/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["cleared"], 0);
}
