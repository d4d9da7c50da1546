//! Integration tests for the GaitVision HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use gaitvision_agent::collector::{create_shared_slot, create_shared_stats, PressureSampler};
    use gaitvision_agent::core::SessionAggregator;
    use gaitvision_agent::server::{run, ServerConfig, ServerState};
    use gaitvision_agent::store::Database;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn start_server() -> (SocketAddr, oneshot::Sender<()>) {
        let mut config = ServerConfig::new("127.0.0.1", 0);
        config.sample_timeout = Duration::from_millis(50);

        let db = Database::open_in_memory().expect("Failed to open database");
        let sampler = PressureSampler::new(create_shared_slot(), create_shared_stats());
        let state = ServerState::new(&config, SessionAggregator::new(db), sampler);

        let (addr, shutdown_tx) = run(config, state).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        (addr, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start_server().await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
        assert_eq!(body["bridge"]["connected"], false);
        assert_eq!(body["bridge"]["frames_published"], 0);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_pressure_without_device() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let body: serde_json::Value = client
            .get(format!("http://{}/pressure", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["source"], "simulated");
        let frame = body["pressure"].as_object().expect("frame object");
        assert_eq!(frame.len(), 12);
        assert!(frame
            .values()
            .all(|v| (0.0..=5.0).contains(&v.as_f64().unwrap())));

        let body: serde_json::Value = client
            .get(format!("http://{}/pressure?timeout=0.05&fallback=false", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["source"], "unavailable");
        assert!(body["pressure"].is_null());

        let response = client
            .get(format!("http://{}/pressure?timeout=-1", addr))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(body["bridge"]["simulated_reads"], 1);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        // Register a patient
        let response = client
            .post(format!("{base}/patients"))
            .json(&json!({"name": "Ana", "age": 30}))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let patient: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        let patient_id = patient["id"].as_str().expect("patient id").to_string();
        assert_eq!(patient["name"], "Ana");
        assert_eq!(patient["age"], 30);
        assert!(patient.get("clinician_id").is_none());

        // Start a session
        let response = client
            .post(format!("{base}/patients/{patient_id}/sessions"))
            .json(&json!({"note": "first visit"}))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let session: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        let session_id = session["id"].as_str().expect("session id").to_string();
        assert_eq!(session["sample_count"], 0);
        assert!(session["end_time"].is_null());

        // A second open session is refused
        let response = client
            .post(format!("{base}/patients/{patient_id}/sessions"))
            .json(&json!({}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_STATE");

        // Append one heel-loaded frame
        let response = client
            .post(format!("{base}/sessions/{session_id}/data"))
            .json(&json!({"sensor_readings": {"fsr5": 1.0, "fsr6": 1.0}}))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let summary: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(summary["sample_count"], 1);
        assert_eq!(summary["max_pressure_kpa"], 100.0);
        assert_eq!(summary["region_averages"]["HEEL"], 100.0);
        assert_eq!(summary["region_averages"]["TOE"], 0.0);
        assert!(summary["duration_seconds"].is_null());

        // Bad timestamps never reach the store
        let response = client
            .post(format!("{base}/sessions/{session_id}/data"))
            .json(&json!({"sensor_readings": {"fsr0": 1.0}, "timestamp": "yesterday"}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // End the session
        let response = client
            .post(format!("{base}/sessions/{session_id}/end"))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let ended: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert!(ended["duration_seconds"].as_f64().expect("duration") >= 0.0);
        assert!(ended["end_time"].as_str().is_some());

        // Closed sessions reject samples
        let response = client
            .post(format!("{base}/sessions/{session_id}/data"))
            .json(&json!({"sensor_readings": {"fsr0": 4.0}}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);

        // Detail lists the stored frame verbatim
        let detail: serde_json::Value = client
            .get(format!("{base}/sessions/{session_id}"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(detail["sample_count"], 1);
        assert_eq!(detail["note"], "first visit");
        let samples = detail["samples"].as_array().expect("samples");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["pressures"], json!({"fsr5": 1.0, "fsr6": 1.0}));

        // Listing
        let sessions: serde_json::Value = client
            .get(format!("{base}/patients/{patient_id}/sessions"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(sessions.as_array().map(Vec::len), Some(1));

        let patients: serde_json::Value = client
            .get(format!("{base}/patients"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(patients[0]["id"], patient_id.as_str());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_client_errors() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let response = client
            .get(format!("{base}/patients/unknown"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "NOT_FOUND");

        let response = client
            .post(format!("{base}/sessions/unknown/end"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = client
            .post(format!("{base}/patients"))
            .json(&json!({"name": "Bruno", "age": 0}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let sessions: serde_json::Value = client
            .get(format!("{base}/patients/unknown/sessions"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(sessions, json!([]));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_invalid_session_requests_are_rejected() {
        let (addr, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        // Non-positive age
        let response = client
            .post(format!("{base}/patients"))
            .json(&json!({"name": "Carla", "age": 0}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let patient: serde_json::Value = client
            .post(format!("{base}/patients"))
            .json(&json!({"name": "Carla", "age": 41}))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let patient_id = patient["id"].as_str().expect("patient id").to_string();
        let sessions_url = format!("{base}/patients/{patient_id}/sessions");

        // Wrongly typed note
        let response = client
            .post(&sessions_url)
            .json(&json!({"note": 5}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // Note over 240 characters
        let response = client
            .post(&sessions_url)
            .json(&json!({"note": "x".repeat(241)}))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // Nothing was opened by the rejected requests
        let sessions: serde_json::Value = client
            .get(&sessions_url)
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(sessions, json!([]));

        // An empty body starts a session without a note
        let response = client
            .post(&sessions_url)
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        let session: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert!(session["note"].is_null());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start_server().await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/patients", addr))
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let _ = shutdown_tx.send(());
    }
}
