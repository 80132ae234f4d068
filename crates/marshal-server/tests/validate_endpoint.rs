use marshal_config::AppConfig;
use marshal_server::{AppState, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    // No remote servers configured: the chain builds from the built-in
    // providers without any preflight.
    let cfg = AppConfig::default();
    let chain = marshal_core::ChainBuilder::from_config(&cfg)
        .build()
        .await
        .expect("build chain");
    let app = build_app(&cfg, AppState::new(chain));

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn service_endpoints_answer() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "FHIR Marshal");
    assert_eq!(body["status"], "ok");

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());

    let resp = client.get(format!("{base}/metadata")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["resourceType"], "CapabilityStatement");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn valid_resource_yields_the_synthesized_informational_outcome() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/validate"))
        .header("content-type", "application/fhir+json")
        .body(json!({"resourceType": "Patient", "name": [{"family": "Chalmers"}]}).to_string())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["resourceType"], "OperationOutcome");
    let issues = outcome["issue"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["severity"], "information");
    assert_eq!(issues[0]["code"], "informational");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn issues_carry_resolved_location_elements() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // Unknown declared profile: the issue points at meta.profile[0] and the
    // enrichment attaches the matched element, wrapped as a Container.
    let resp = client
        .post(format!("{base}/validate"))
        .header("content-type", "application/fhir+json")
        .body(
            json!({
                "resourceType": "Patient",
                "meta": {"profile": ["http://example.org/sd/unknown"]}
            })
            .to_string(),
        )
        .send()
        .await
        .unwrap();
    let outcome: Value = resp.json().await.unwrap();
    let issues = outcome["issue"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["severity"], "error");

    let location = issues[0]["location"].as_array().unwrap();
    assert_eq!(location[0], "Patient.meta.profile[0]");
    let element: Value = serde_json::from_str(location[1].as_str().unwrap()).unwrap();
    assert_eq!(element["resourceType"], "Container");
    assert_eq!(element["element"], "http://example.org/sd/unknown");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn ndjson_body_yields_one_outcome_line_per_resource() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let body = [
        json!({"resourceType": "Patient"}).to_string(),
        json!({"resourceType": "Wombat"}).to_string(),
        "not json at all".to_string(),
    ]
    .join("\n");

    let resp = client
        .post(format!("{base}/validate"))
        .header("content-type", "application/fhir+ndjson")
        .body(body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .contains("ndjson")
    );

    let text = resp.text().await.unwrap();
    let outcomes: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["issue"][0]["severity"], "information");
    assert_eq!(outcomes[1]["issue"][0]["severity"], "error");
    assert!(
        outcomes[2]["issue"][0]["diagnostics"]
            .as_str()
            .unwrap()
            .starts_with("Line 3")
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn xml_bodies_are_answered_with_415() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/validate"))
        .header("content-type", "application/fhir+xml")
        .body("<Patient/>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["issue"][0]["code"], "not-supported");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn unparseable_json_is_a_bad_request() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/validate"))
        .header("content-type", "application/fhir+json")
        .body("{ not json }")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["resourceType"], "OperationOutcome");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
