//! HTTP contract tests: the adapter API served on a loopback port, backed by
//! mocked registry and Clair endpoints.
//!
//! ```bash
//! cargo test --test api_server
//! ```

mod common;

use clair_adapter::harbor::{
    MIME_TYPE_ERROR, MIME_TYPE_HARBOR_REPORT, MIME_TYPE_METADATA, MIME_TYPE_RAW_REPORT,
    MIME_TYPE_SCAN_REQUEST, MIME_TYPE_SCAN_RESPONSE,
};
use clair_adapter::{api, ImageScanner};
use httpmock::prelude::*;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::*;

/// Start the adapter against `clair_url` and return its listening address.
async fn spawn_adapter(clair_url: &str) -> SocketAddr {
    let scanner = ImageScanner::from_config(&config(clair_url)).expect("scanner from config");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(api::serve_listener(listener, scanner));
    addr
}

/// Start the adapter against `clair_url` and return its API base URL.
async fn start_adapter(clair_url: &str) -> String {
    format!("http://{}/api/v1", spawn_adapter(clair_url).await)
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

/// Send `request` verbatim and return the whole response text. Bypasses the
/// URL normalisation an HTTP client would apply.
async fn send_raw(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("response in time")
        .expect("read");
    response
}

fn content_type(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

#[tokio::test]
async fn metadata_describes_clair() {
    let clair = MockServer::start_async().await;
    let base = start_adapter(&clair.base_url()).await;

    let resp = http().get(format!("{base}/metadata")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(content_type(&resp), MIME_TYPE_METADATA);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["scanner"]["name"], "Clair");
    assert_eq!(body["scanner"]["vendor"], "CoreOS");
    assert_eq!(body["scanner"]["version"], "2.0.8");
    let consumes = body["capabilities"][0]["consumes_mime_types"]
        .as_array()
        .expect("consumes list");
    assert!(consumes.iter().any(|m| m == "application/vnd.oci.image.manifest.v1+json"));
}

#[tokio::test]
async fn health_is_ok() {
    let clair = MockServer::start_async().await;
    let base = start_adapter(&clair.base_url()).await;

    let resp = http().get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn scan_then_report_round_trip() {
    let registry = MockServer::start_async().await;
    registry
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/v2/{}/manifests/{}", REPOSITORY, IMAGE_DIGEST));
            then.status(200).json_body(docker_manifest(&[BASE_DIGEST, APP_DIGEST]));
        })
        .await;

    let clair = MockServer::start_async().await;
    clair
        .mock_async(|when, then| {
            when.method(POST).path("/v1/layers");
            then.status(201).json_body(json!({}));
        })
        .await;

    let base = start_adapter(&clair.base_url()).await;

    let resp = http()
        .post(format!("{base}/scan"))
        .header(CONTENT_TYPE, MIME_TYPE_SCAN_REQUEST)
        .body(scan_request_json(&registry.base_url()).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    assert_eq!(content_type(&resp), MIME_TYPE_SCAN_RESPONSE);
    let id = resp.json::<Value>().await.unwrap()["id"]
        .as_str()
        .expect("scan id")
        .to_string();
    assert_eq!(id.len(), 64);

    clair
        .mock_async(|when, then| {
            when.method(GET).path(format!("/v1/layers/{}", id));
            then.status(200).json_body(clair_result(&id));
        })
        .await;

    let resp = http()
        .get(format!("{base}/scan/{id}/report"))
        .header(ACCEPT, MIME_TYPE_HARBOR_REPORT)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(content_type(&resp), MIME_TYPE_HARBOR_REPORT);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["severity"], "High");
    assert_eq!(report["vulnerabilities"][0]["id"], "CVE-X");
    assert_eq!(report["vulnerabilities"][0]["fix_version"], "1.0.1");
    assert_eq!(report["scanner"]["name"], "Clair");

    let resp = http()
        .get(format!("{base}/scan/{id}/report"))
        .header(ACCEPT, MIME_TYPE_RAW_REPORT)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(content_type(&resp), MIME_TYPE_RAW_REPORT);
    let raw: Value = resp.json().await.unwrap();
    assert_eq!(raw["Layer"]["Name"], id.as_str());
    assert_eq!(raw["Layer"]["Features"][0]["Vulnerabilities"][0]["Severity"], "High");
}

#[tokio::test]
async fn unknown_report_is_404() {
    let clair = MockServer::start_async().await;
    clair
        .mock_async(|when, then| {
            when.method(GET).path("/v1/layers/unknown");
            then.status(404).json_body(clair_error("the resource cannot be found"));
        })
        .await;
    let base = start_adapter(&clair.base_url()).await;

    let resp = http()
        .get(format!("{base}/scan/unknown/report"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(content_type(&resp), MIME_TYPE_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]["message"].as_str().is_some());
}

#[tokio::test]
async fn malformed_scan_request_is_400() {
    let clair = MockServer::start_async().await;
    let base = start_adapter(&clair.base_url()).await;

    let resp = http()
        .post(format!("{base}/scan"))
        .body("{\"registry\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(content_type(&resp), MIME_TYPE_ERROR);
}

#[tokio::test]
async fn scan_request_without_digest_is_400() {
    let clair = MockServer::start_async().await;
    let base = start_adapter(&clair.base_url()).await;

    let mut body = scan_request_json("https://registry.invalid");
    body["artifact"]["digest"] = json!("");

    let resp = http()
        .post(format!("{base}/scan"))
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn clair_failure_is_generic_500() {
    let registry = MockServer::start_async().await;
    registry
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/v2/{}/manifests/{}", REPOSITORY, IMAGE_DIGEST));
            then.status(200).json_body(docker_manifest(&[BASE_DIGEST]));
        })
        .await;
    let clair = MockServer::start_async().await;
    clair
        .mock_async(|when, then| {
            when.method(POST).path("/v1/layers");
            then.status(500).json_body(clair_error("pq: connection refused"));
        })
        .await;
    let base = start_adapter(&clair.base_url()).await;

    let resp = http()
        .post(format!("{base}/scan"))
        .body(scan_request_json(&registry.base_url()).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let text = resp.text().await.unwrap();
    assert!(text.contains("Internal Server Error"));
    assert!(!text.contains("pq: connection refused"));
    assert!(!text.contains(TOKEN));
}

#[tokio::test]
async fn invalid_content_length_is_400() {
    let clair = MockServer::start_async().await;
    let addr = spawn_adapter(&clair.base_url()).await;

    let response = send_raw(
        addr,
        "POST /api/v1/scan HTTP/1.1\r\nHost: adapter\r\nContent-Length: lots\r\n\r\n{}",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains("Content-Length"), "{response}");
}

#[tokio::test]
async fn dot_segment_scan_id_never_reaches_clair() {
    let clair = MockServer::start_async().await;
    let clair_root = clair
        .mock_async(|when, then| {
            when.method(GET).path("/v1/");
            then.status(200).json_body(json!({}));
        })
        .await;
    let addr = spawn_adapter(&clair.base_url()).await;

    let response = send_raw(
        addr,
        "GET /api/v1/scan/../report HTTP/1.1\r\nHost: adapter\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert_eq!(clair_root.calls_async().await, 0);
}
