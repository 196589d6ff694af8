use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use railvision_analysis::{default_registry, AnalysisConfig, DummyBackend};
use railvision_core::{BackendRegistry, LocalStorage, Orchestrator, OrchestratorConfig};
use railvision_server::{create_app, AppState};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "railvision-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// App with the built-in backends and an instant dummy.
async fn test_app(upload_limit: usize) -> (Router, tempfile::TempDir) {
    let config = AnalysisConfig {
        dummy_min_delay: Duration::ZERO,
        dummy_max_delay: Duration::from_millis(20),
        ..AnalysisConfig::default()
    };
    app_with_registry(default_registry(&config), upload_limit).await
}

async fn app_with_registry(
    registry: BackendRegistry,
    upload_limit: usize,
) -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(dir.path()).await.unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(storage),
        OrchestratorConfig::default(),
    );
    let app = create_app(AppState::new(orchestrator, "dummy", upload_limit));
    (app, dir)
}

/// Helper to make a request to the app.
async fn request(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()).await
}

async fn upload(app: &Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/video/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

async fn wait_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..400 {
        let (status, body) = request(app, "GET", &format!("/api/video/{job_id}/status")).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "SUCCEEDED" || body["status"] == "FAILED" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never finished");
}

fn video(data: &[u8]) -> Part<'_> {
    Part::File {
        filename: "clip.mp4",
        content_type: "video/mp4",
        data,
    }
}

#[tokio::test]
async fn health_reports_up() {
    let (app, _dir) = test_app(1024 * 1024).await;
    let (status, body) = request(&app, "GET", "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn models_are_listed_sorted() {
    let (app, _dir) = test_app(1024 * 1024).await;
    let (status, body) = request(&app, "GET", "/api/video/models").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!(["dummy", "opencv_basic", "railway_detection"])
    );
}

#[tokio::test]
async fn dummy_upload_runs_to_success() {
    let (app, dir) = test_app(1024 * 1024).await;
    let data = b"not really a video, the dummy does not care";

    let (status, body) = upload(&app, &[Part::Text("model_name", "dummy"), video(data)]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let final_status = wait_terminal(&app, &job_id).await;
    assert_eq!(final_status["status"], "SUCCEEDED");
    assert_eq!(final_status["message"], Value::Null);

    let (status, result) = request(&app, "GET", &format!("/api/video/{job_id}/result")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["job_id"], job_id.as_str());
    assert_eq!(result["result"]["model_name"], "dummy");
    assert!(result["result"]["objects_detected"].as_u64().is_some());
    assert!(result["completed_at"].is_string());

    let stored = dir.path().join(&job_id).join("video.mp4");
    assert_eq!(std::fs::read(stored).unwrap(), data.to_vec());
}

#[tokio::test]
async fn file_before_model_name_uses_given_model() {
    let (app, _dir) = test_app(1024 * 1024).await;

    let (status, body) = upload(&app, &[video(b"abc"), Part::Text("model_name", "dummy")]).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(wait_terminal(&app, &job_id).await["status"], "SUCCEEDED");
}

#[tokio::test]
async fn missing_model_name_uses_default_backend() {
    let (app, _dir) = test_app(1024 * 1024).await;

    let (status, body) = upload(&app, &[video(b"abc")]).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, jobs) = request(&app, "GET", "/api/video/jobs").await;
    assert_eq!(jobs[0]["backend_name"], "dummy");
    assert_eq!(jobs[0]["original_filename"], "clip.mp4");
}

#[tokio::test]
async fn non_video_upload_is_rejected_without_a_job() {
    let (app, _dir) = test_app(1024 * 1024).await;
    let parts = [
        Part::Text("model_name", "dummy"),
        Part::File {
            filename: "notes.txt",
            content_type: "text/plain",
            data: b"hello",
        },
    ];

    let (status, body) = upload(&app, &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], "File must be a video");

    let (_, jobs) = request(&app, "GET", "/api/video/jobs").await;
    assert_eq!(jobs, serde_json::json!([]));
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let (app, _dir) = test_app(1024 * 1024).await;

    let (status, body) = upload(&app, &[Part::Text("model_name", "dummy")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn unknown_model_lists_available_backends() {
    let (app, dir) = test_app(1024 * 1024).await;

    let (status, body) = upload(&app, &[Part::Text("model_name", "yolo"), video(b"abc")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("yolo"));
    assert!(details.contains("railway_detection"));

    let (_, jobs) = request(&app, "GET", "/api/video/jobs").await;
    assert_eq!(jobs, serde_json::json!([]));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let (app, _dir) = test_app(1024 * 1024).await;
    let missing = "00000000-0000-4000-8000-000000000000";

    for uri in [
        format!("/api/video/{missing}/status"),
        format!("/api/video/{missing}/result"),
        "/api/video/not-a-job/status".to_string(),
    ] {
        let (status, body) = request(&app, "GET", &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "Job not found");
    }

    let (status, _) = request(&app, "POST", &format!("/api/video/{missing}/cancel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn jobs_are_listed_newest_first() {
    let (app, _dir) = test_app(1024 * 1024).await;

    let mut ids = Vec::new();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        let part = Part::File {
            filename: name,
            content_type: "video/mp4",
            data: b"x",
        };
        let (_, body) = upload(&app, &[Part::Text("model_name", "dummy"), part]).await;
        ids.push(body["job_id"].as_str().unwrap().to_string());
    }

    let (status, jobs) = request(&app, "GET", "/api/video/jobs?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["job_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[2].as_str(), ids[1].as_str()]);
}

#[tokio::test]
async fn running_job_can_be_cancelled() {
    let registry = BackendRegistry::new();
    registry.register(Arc::new(DummyBackend::new(
        Duration::from_secs(30),
        Duration::from_secs(30),
    )));
    let (app, _dir) = app_with_registry(registry, 1024 * 1024).await;

    let (_, body) = upload(&app, &[Part::Text("model_name", "dummy"), video(b"abc")]).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, cancel) = request(&app, "POST", &format!("/api/video/{job_id}/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancel["cancelled"], true);

    let final_status = wait_terminal(&app, &job_id).await;
    assert_eq!(final_status["status"], "FAILED");
    assert_eq!(final_status["message"], "cancelled");

    let (_, again) = request(&app, "POST", &format!("/api/video/{job_id}/cancel")).await;
    assert_eq!(again["cancelled"], false);
}

#[tokio::test]
async fn oversized_buffered_upload_is_rejected() {
    let (app, _dir) = test_app(1024).await;
    let data = vec![0u8; 8 * 1024];

    let (status, _) = upload(&app, &[video(&data), Part::Text("model_name", "dummy")]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (_, jobs) = request(&app, "GET", "/api/video/jobs").await;
    assert_eq!(jobs, serde_json::json!([]));
}

#[tokio::test]
async fn undecodable_media_fails_real_backend() {
    let (app, _dir) = test_app(1024 * 1024).await;

    // Garbage bytes: ffprobe rejects them, or is absent entirely.
    let (status, body) =
        upload(&app, &[Part::Text("model_name", "opencv_basic"), video(b"garbage")]).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let final_status = wait_terminal(&app, &job_id).await;
    assert_eq!(final_status["status"], "FAILED");
    assert!(final_status["message"]
        .as_str()
        .unwrap()
        .starts_with("Analysis failed"));
}
