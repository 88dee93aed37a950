//! End-to-end route tests with stub face and emotion capabilities

use api::rate_limit::RateLimitConfig;
use api::{create_rate_limited_router, create_router, AppState, ServerError};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use camera_capture::{CaptureError, ImageSequenceSource, Region};
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use inference_engine::{EmotionClassifier, EmotionLabel, EmotionScores, InferenceError, NormalizedFace};
use serde_json::{json, Value};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use stress_monitor::{
    CaptureLoop, FaceDetector, FaceLocator, FaceSelection, ResultStore, ResultWriter,
    StressPipeline, StressResult,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

const BOUNDARY: &str = "stress-test-boundary";

/// Reports the bounding box of all dark pixels as a face
struct DarkRegionDetector;

impl FaceDetector for DarkRegionDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<Region> {
        let dark: Vec<(u32, u32)> = gray
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] < 64)
            .map(|(x, y, _)| (x, y))
            .collect();
        if dark.is_empty() {
            return vec![];
        }
        let min_x = dark.iter().map(|p| p.0).min().unwrap();
        let max_x = dark.iter().map(|p| p.0).max().unwrap();
        let min_y = dark.iter().map(|p| p.1).min().unwrap();
        let max_y = dark.iter().map(|p| p.1).max().unwrap();
        vec![Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)]
    }
}

/// Dark faces read as angry, bright ones as happy
struct BrightnessClassifier;

impl EmotionClassifier for BrightnessClassifier {
    fn classify(&self, face: &NormalizedFace) -> Result<EmotionScores, InferenceError> {
        let values = face.to_vec();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let mut scores = [0.0; 7];
        if mean < 0.5 {
            scores[EmotionLabel::Anger.index()] = 1.0;
        } else {
            scores[EmotionLabel::Happy.index()] = 1.0;
        }
        Ok(EmotionScores::new(scores))
    }
}

fn stub_pipeline() -> Arc<StressPipeline> {
    Arc::new(StressPipeline::new(
        FaceLocator::new(Arc::new(DarkRegionDetector), FaceSelection::First),
        Arc::new(BrightnessClassifier),
    ))
}

fn setup() -> (Router, ResultWriter) {
    let (writer, reader) = ResultStore::channel();
    let state = AppState::new(stub_pipeline(), reader);
    (create_router(Arc::new(state)), writer)
}

fn png(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

fn angry_face_png() -> Vec<u8> {
    let mut img = RgbImage::from_pixel(96, 96, Rgb([230, 230, 230]));
    for y in 24..72 {
        for x in 24..72 {
            img.put_pixel(x, y, Rgb([15, 10, 10]));
        }
    }
    png(&img)
}

fn multipart_body(bytes: &[u8], filename: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(bytes: &[u8], filename: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze-stress")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(bytes, filename)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn root_reports_liveness() {
    let (app, _writer) = setup();
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Stress Level Detector API is running!"}));
}

#[tokio::test]
async fn angry_face_upload_is_high_stress() {
    let (app, _writer) = setup();
    let (status, body) = send(&app, upload(&angry_face_png(), "face.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "emotion": "Anger",
            "stress_level": 70.0,
            "recommendations": ["Take a 5-minute deep breathing break"]
        })
    );
}

#[tokio::test]
async fn blank_upload_reports_no_face() {
    let (app, _writer) = setup();
    let blank = png(&RgbImage::from_pixel(64, 64, Rgb([200, 200, 200])));
    let (status, body) = send(&app, upload(&blank, "blank.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "No face detected"}));
}

#[tokio::test]
async fn malformed_upload_is_bad_request() {
    let (app, _writer) = setup();
    let (status, body) = send(&app, upload(b"%PDF-1.4 not an image", "doc.pdf")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid image"}));
}

#[tokio::test]
async fn non_multipart_upload_is_bad_request() {
    let (app, _writer) = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/analyze-stress")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image uploaded"}));
}

#[tokio::test]
async fn latest_is_empty_before_first_cycle() {
    let (app, _writer) = setup();
    let (status, body) = send(&app, get("/latest-stress-level")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn latest_returns_stored_result_verbatim() {
    let (app, writer) = setup();

    writer.publish(StressResult::no_face());
    let (_, body) = send(&app, get("/latest-stress-level")).await;
    assert_eq!(body, json!({"error": "No face detected"}));

    writer.publish(stress_monitor::mapper::assess(EmotionLabel::Sad).into());
    let (_, body) = send(&app, get("/latest-stress-level")).await;
    assert_eq!(
        body,
        json!({
            "emotion": "Sad",
            "stress_level": 50.0,
            "recommendations": ["Drink a glass of water and take a break from the screen"]
        })
    );
}

#[tokio::test]
async fn upload_does_not_touch_latest_result() {
    let (app, _writer) = setup();
    send(&app, upload(&angry_face_png(), "face.png")).await;
    let (_, body) = send(&app, get("/latest-stress-level")).await;
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn latest_survives_writer_shutdown() {
    let (app, writer) = setup();
    writer.publish(stress_monitor::mapper::assess(EmotionLabel::Happy).into());
    drop(writer);

    let (status, body) = send(&app, get("/latest-stress-level")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emotion"], "Happy");
    assert_eq!(body["stress_level"], 20.0);
}

#[tokio::test]
async fn health_without_capture() {
    let (app, _writer) = setup();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["capture"], Value::Null);
    assert_eq!(body["last_update_ms"], Value::Null);
}

#[tokio::test]
async fn metrics_without_recorder_is_empty() {
    let (app, _writer) = setup();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let (app, _writer) = setup();
    let oversized = vec![0u8; 11 * 1024 * 1024];
    let (status, body) = send(&app, upload(&oversized, "huge.png")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({"error": "Image too large"}));
}

#[tokio::test]
async fn health_degraded_when_webcam_fails_to_open() {
    let (writer, reader) = ResultStore::channel();
    let pipeline = stub_pipeline();
    let handle = CaptureLoop::new(Arc::clone(&pipeline), writer).start(|| {
        Err::<ImageSequenceSource, _>(CaptureError::Open(
            "cannot open webcam /dev/video0".to_string(),
        ))
    });
    handle
        .subscribe()
        .wait_for(|s| s.state.is_finished())
        .await
        .unwrap();

    let state = AppState::new(pipeline, reader).with_capture(handle.subscribe());
    let app = create_router(Arc::new(state));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["capture"]["state"], "stopped");
    assert_eq!(body["capture"]["cycles"], 0);
    assert!(body["capture"]["last_error"]
        .as_str()
        .unwrap()
        .contains("cannot open webcam"));

    // On-demand analysis keeps working without a live source
    let (status, body) = send(&app, upload(&angry_face_png(), "face.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emotion"], "Anger");
}

#[test]
fn zero_burst_rate_limit_is_rejected() {
    let (_writer, reader) = ResultStore::channel();
    let state = Arc::new(AppState::new(stub_pipeline(), reader));
    let limits = RateLimitConfig {
        per_second: 2,
        burst_size: 0,
    };
    assert!(matches!(
        create_rate_limited_router(state, &limits),
        Err(ServerError::RateLimit(2, 0))
    ));
}

/// Send one upload over a fresh connection and return the status code
async fn post_over_socket(addr: SocketAddr, payload: &[u8]) -> u16 {
    let body = multipart_body(payload, "doc.bin");
    let mut request = format!(
        "POST /analyze-stress HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
         Content-Type: multipart/form-data; boundary={BOUNDARY}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(&request).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();

    let response = String::from_utf8_lossy(&response);
    response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap()
}

#[tokio::test]
async fn served_router_limits_uploads_per_peer() {
    let (_writer, reader) = ResultStore::channel();
    let state = Arc::new(AppState::new(stub_pipeline(), reader));
    let app = create_rate_limited_router(state, &RateLimitConfig::default()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Burst of five is admitted (and rejected as undecodable), the sixth is throttled
    for _ in 0..5 {
        assert_eq!(post_over_socket(addr, b"not an image").await, 400);
    }
    assert_eq!(post_over_socket(addr, b"not an image").await, 429);
}
