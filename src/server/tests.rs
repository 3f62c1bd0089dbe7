use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::app::client::{ClientConfig, Fetch, Fetched, HttpFetcher, RetryPolicy};
use crate::config::BatchConfig;
use crate::errors::{FetchError, FetchFailure, FetchResult};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

fn harvester() -> Arc<ImageHarvester> {
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(2),
    };
    let fetcher = HttpFetcher::new(&ClientConfig::default(), policy).unwrap();
    Arc::new(ImageHarvester::new(Arc::new(fetcher), BatchConfig::default()).unwrap())
}

fn router() -> Router {
    create_router(harvester(), &ServerConfig::default())
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG.to_vec())
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG.to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<img src="a.png"><img src="/a.png"><img src="/icon.svg">"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_health_endpoints() {
    for uri in ["/", "/health"] {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }
}

#[tokio::test]
async fn test_fetch_images_requires_url() {
    let response = router()
        .oneshot(post_json("/api/fetch-images", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "URL is required");
}

#[tokio::test]
async fn test_fetch_images_lists_candidates() {
    let server = image_server().await;
    let page = format!("{}/page.html", server.uri());

    let response = router()
        .oneshot(post_json(
            "/api/fetch-images",
            serde_json::json!({ "url": page }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["images"],
        serde_json::json!([format!("{}/a.png", server.uri())])
    );
}

#[tokio::test]
async fn test_download_all_rejects_empty_list() {
    let response = router()
        .oneshot(post_json(
            "/api/download-all",
            serde_json::json!({ "urls": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_all_streams_zip() {
    let server = image_server().await;
    let urls = vec![
        format!("{}/a.png", server.uri()),
        "http://127.0.0.1:1/doesnotexist".to_string(),
        format!("{}/b", server.uri()),
    ];

    let response = router()
        .oneshot(post_json(
            "/api/download-all",
            serde_json::json!({ "urls": urls }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"images-"));
    assert!(disposition.ends_with(".zip\""));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["image-001.png", "image-003.jpg"]);

    let mut data = Vec::new();
    archive
        .by_name("image-003.jpg")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    assert_eq!(data, JPEG);
}

#[tokio::test]
async fn test_download_all_query_form() {
    let server = image_server().await;
    let urls = serde_json::json!([format!("{}/a.png", server.uri())]).to_string();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("urls", &urls)
        .finish();

    let response = router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/download-all?{}", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);
}

#[tokio::test]
async fn test_download_all_query_must_be_json() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/api/download-all?urls=not-json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_single_image() {
    let server = image_server().await;
    let uri = format!("/api/download?url={}/a.png", server.uri());

    let response = router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"a.png\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], PNG);
}

#[tokio::test]
async fn test_download_single_rejects_html() {
    let server = image_server().await;
    let uri = format!("/api/download?url={}/page.html", server.uri());

    let response = router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_single_transport_failure() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/api/download?url=http://127.0.0.1:1/doesnotexist.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to download image");
    assert!(body["details"].as_str().is_some());
}

#[tokio::test]
async fn test_production_cors_rejects_unknown_origin() {
    let config = ServerConfig {
        production: true,
        allowed_origins: vec!["https://app.example.com".to_string()],
        ..Default::default()
    };
    let app = create_router(harvester(), &config);

    let request = |origin: &str| {
        Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app
        .clone()
        .oneshot(request("https://app.example.com"))
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS],
        "content-disposition"
    );

    let denied = app.oneshot(request("https://evil.example")).await.unwrap();
    assert!(denied
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

/// Fetcher that fails every locator after a short delay, counting calls
#[derive(Default)]
struct SlowFailingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetch for SlowFailingFetcher {
    async fn retrieve(&self, _locator: &url::Url) -> FetchResult<Fetched> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(FetchFailure {
            attempts: 1,
            error: FetchError::Refused {
                message: "connection refused".to_string(),
            },
        })
    }
}

#[tokio::test]
async fn test_dropped_response_cancels_batch() {
    // Test that a client leaving mid-stream stops the remaining retrievals
    let fetcher = Arc::new(SlowFailingFetcher::default());
    let harvester = ImageHarvester::new(
        fetcher.clone(),
        BatchConfig {
            concurrency: 2,
            ..Default::default()
        },
    )
    .unwrap();
    let app = create_router(Arc::new(harvester), &ServerConfig::default());

    let urls: Vec<String> = (0..20)
        .map(|i| format!("https://example.com/{}.png", i))
        .collect();
    let response = app
        .oneshot(post_json(
            "/api/download-all",
            serde_json::json!({ "urls": urls }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(75)).await;
    drop(response);

    // A full run would take 10 rounds of 50ms
    tokio::time::sleep(Duration::from_millis(700)).await;
    let calls = fetcher.calls.load(Ordering::SeqCst);
    assert!(calls < 20, "{} retrievals ran after the client left", calls);
    assert!(calls <= 6);
}
