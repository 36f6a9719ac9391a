//! Harbor scanner adapter HTTP API (`/api/v1`).

use std::net::SocketAddr;

use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::ErrorKind;
use crate::harbor::{
    ScanRequest, MIME_TYPE_ERROR, MIME_TYPE_HARBOR_REPORT, MIME_TYPE_METADATA,
    MIME_TYPE_RAW_REPORT, MIME_TYPE_SCAN_RESPONSE,
};
use crate::scanner::ImageScanner;
use crate::Error;

const API_PREFIX: &str = "/api/v1";
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Bind `addr` and serve the API until the process exits.
pub async fn serve(addr: SocketAddr, scanner: ImageScanner) -> crate::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, scanner).await
}

/// Serve the API on an already-bound listener.
pub async fn serve_listener(listener: TcpListener, scanner: ImageScanner) -> crate::Result<()> {
    info!(addr = %listener.local_addr()?, "scanner adapter listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let scanner = scanner.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_stream(stream, scanner).await {
                warn!(%peer, error = %e, "connection error");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Request / response framing
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Request {
    method: String,
    path: String,
    accept: Option<String>,
    content_length: usize,
    body: Vec<u8>,
}

#[derive(Debug)]
struct Response {
    status: &'static str,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn json<T: Serialize>(status: &'static str, content_type: &'static str, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                content_type,
                body,
            },
            Err(e) => error_response(&Error::Serde(e)),
        }
    }

    fn error(status: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: MIME_TYPE_ERROR,
            body: json!({ "error": { "message": message.into() } }).to_string(),
        }
    }
}

async fn handle_stream(mut stream: TcpStream, scanner: ImageScanner) -> crate::Result<()> {
    let response = match read_request(&mut stream).await {
        Ok(Some(req)) => route_request(&req, &scanner).await,
        Ok(None) => return Ok(()),
        Err(e @ Error::InvalidRequest(_)) => {
            debug!(error = %e, "rejecting malformed request");
            error_response(&e)
        }
        Err(e) => return Err(e),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len(),
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read one request: headers up to the blank line, then `Content-Length`
/// bytes of body. Returns `None` if the peer closed before sending anything.
async fn read_request(stream: &mut TcpStream) -> crate::Result<Option<Request>> {
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 8 * 1024];

    let header_end = loop {
        if let Some(idx) = find_header_end(&buf) {
            break idx;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(Error::InvalidRequest("request headers too large".into()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(Error::InvalidRequest("connection closed mid-request".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let mut req = parse_head(&String::from_utf8_lossy(&buf[..header_end]))?;
    let content_length = req.content_length;
    if content_length > MAX_REQUEST_BYTES {
        return Err(Error::InvalidRequest("request body too large".into()));
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    req.body = body;
    Ok(Some(req))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the request line and the headers we care about. The body is filled
/// in by the caller.
fn parse_head(head: &str) -> crate::Result<Request> {
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("");
    let path = target.split('?').next().unwrap_or("").to_string();

    let mut accept = None;
    let mut content_length = 0usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().map_err(|_| {
                Error::InvalidRequest(format!("invalid Content-Length '{value}'"))
            })?;
        } else if name.eq_ignore_ascii_case("accept") {
            accept = Some(value.to_string());
        }
    }

    Ok(Request {
        method,
        path,
        accept,
        content_length,
        body: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

async fn route_request(req: &Request, scanner: &ImageScanner) -> Response {
    let Some(path) = req.path.strip_prefix(API_PREFIX) else {
        return Response::error("404 Not Found", "route not found");
    };

    match (req.method.as_str(), path) {
        ("GET", "/health") => Response::json(
            "200 OK",
            "application/json",
            &json!({ "status": "ok" }),
        ),
        ("GET", "/metadata") => {
            Response::json("200 OK", MIME_TYPE_METADATA, &scanner.metadata())
        }
        ("POST", "/scan") => accept_scan_request(&req.body, scanner).await,
        _ => {
            if let Some(id) = path
                .strip_prefix("/scan/")
                .and_then(|rest| rest.strip_suffix("/report"))
            {
                if req.method == "GET" {
                    return get_scan_report(id, req.accept.as_deref(), scanner).await;
                }
                return Response::error("405 Method Not Allowed", "method not allowed");
            }
            Response::error("404 Not Found", "route not found")
        }
    }
}

async fn accept_scan_request(body: &[u8], scanner: &ImageScanner) -> Response {
    let req: ScanRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return Response::error("400 Bad Request", format!("invalid JSON: {e}")),
    };
    debug!(
        repository = %req.artifact.repository,
        digest = %req.artifact.digest,
        "scan request received",
    );

    match scanner.scan(&req).await {
        Ok(resp) => Response::json("202 Accepted", MIME_TYPE_SCAN_RESPONSE, &resp),
        Err(e) => error_response(&e),
    }
}

async fn get_scan_report(id: &str, accept: Option<&str>, scanner: &ImageScanner) -> Response {
    debug!(scan_id = id, "scan report requested");

    let wants_raw = accept.is_some_and(|a| a.contains(MIME_TYPE_RAW_REPORT));
    if wants_raw {
        return match scanner.raw_report(id).await {
            Ok(raw) => Response::json("200 OK", MIME_TYPE_RAW_REPORT, &raw),
            Err(e) => error_response(&e),
        };
    }

    match scanner.get_report(id).await {
        Ok(report) => {
            info!(
                scan_id = id,
                severity = %report.severity,
                vulnerabilities = report.vulnerabilities.len(),
                "scan report served",
            );
            Response::json("200 OK", MIME_TYPE_HARBOR_REPORT, &report)
        }
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &Error) -> Response {
    match e.kind() {
        ErrorKind::InvalidInput => Response::error("400 Bad Request", e.to_string()),
        ErrorKind::NotFound => Response::error("404 Not Found", e.to_string()),
        ErrorKind::Upstream | ErrorKind::Backend | ErrorKind::Internal => {
            error!(error = %e, "internal server error");
            Response::error("500 Internal Server Error", "Internal Server Error")
        }
    }
}
