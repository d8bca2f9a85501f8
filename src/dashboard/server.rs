use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;

use super::store::DashboardState;
use crate::narrate::{Language, NarrationEvent};

const MAX_HEADER_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 64 * 1024;

pub const ALIVE_MESSAGE: &str = "Percepta backend alive";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("dashboard server thread panicked"))?;
        }
        Ok(())
    }
}

/// Dashboard HTTP endpoint over a shared `DashboardState`.
pub struct ApiServer {
    cfg: ApiConfig,
    state: Arc<DashboardState>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, state: Arc<DashboardState>) -> Self {
        Self { cfg, state }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .map_err(|e| anyhow!("invalid dashboard address '{}': {}", self.cfg.addr, e))?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "dashboard configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let state = self.state;
        let join = std::thread::Builder::new()
            .name("dashboard".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, &state, &shutdown_thread) {
                    log::error!("dashboard api stopped: {}", err);
                }
            })?;
        log::info!("dashboard listening on http://{}", addr);

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, state: &DashboardState, shutdown: &AtomicBool) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, state) {
                    log::warn!("dashboard request failed: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: &DashboardState) -> Result<()> {
    // accepted sockets inherit non-blocking mode on some platforms
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json(&mut stream, 403, &json!({"error": "forbidden"}))?;
        return Ok(());
    }

    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) if err.is::<RequestTooLarge>() => {
            write_json(&mut stream, 413, &json!({"error": "request_too_large"}))?;
            return Err(err);
        }
        Err(err) => {
            write_json(&mut stream, 400, &json!({"error": err.to_string()}))?;
            return Err(err);
        }
    };
    log::debug!("dashboard {} {}", request.method, request.path);

    let (status, body) = route(&request, state);
    match body {
        Reply::Text(text) => write_response(&mut stream, status, "text/plain; charset=utf-8", text.as_bytes()),
        Reply::Json(value) => write_json(&mut stream, status, &value),
    }
}

enum Reply {
    Text(&'static str),
    Json(serde_json::Value),
}

#[derive(Deserialize)]
struct LanguageRequest {
    language: String,
}

fn route(request: &HttpRequest, state: &DashboardState) -> (u16, Reply) {
    let method = request.method.as_str();
    let allowed: &[&str] = match request.path.as_str() {
        "/" | "/status" | "/latest" => &["GET"],
        "/update" | "/reset" => &["POST"],
        "/language" => &["GET", "POST"],
        _ => return (404, Reply::Json(json!({"error": "not_found"}))),
    };
    if !allowed.contains(&method) {
        return (405, Reply::Json(json!({"error": "method_not_allowed"})));
    }

    match (method, request.path.as_str()) {
        ("GET", "/") => (200, Reply::Text(ALIVE_MESSAGE)),
        ("GET", "/status") => json_reply(200, &state.status()),
        ("GET", "/latest") => json_reply(200, &state.latest()),
        ("POST", "/update") => match serde_json::from_slice::<NarrationEvent>(&request.body) {
            Ok(event) => {
                state.update(event);
                (200, Reply::Json(json!({"ok": true})))
            }
            Err(err) => bad_request(format!("invalid narration record: {}", err)),
        },
        ("POST", "/reset") => {
            state.reset();
            (200, Reply::Json(json!({"ok": true})))
        }
        ("GET", "/language") => (200, Reply::Json(json!({"language": state.language()}))),
        ("POST", "/language") => {
            let requested = match serde_json::from_slice::<LanguageRequest>(&request.body) {
                Ok(body) => body.language,
                Err(err) => return bad_request(format!("invalid language request: {}", err)),
            };
            match Language::parse(&requested) {
                Ok(language) => {
                    state.set_language(language.clone());
                    (200, Reply::Json(json!({"ok": true, "language": language})))
                }
                Err(err) => bad_request(err.to_string()),
            }
        }
        _ => (405, Reply::Json(json!({"error": "method_not_allowed"}))),
    }
}

fn json_reply<T: serde::Serialize>(status: u16, value: &T) -> (u16, Reply) {
    match serde_json::to_value(value) {
        Ok(value) => (status, Reply::Json(value)),
        Err(err) => (500, Reply::Json(json!({"error": err.to_string()}))),
    }
}

fn bad_request(message: String) -> (u16, Reply) {
    (400, Reply::Json(json!({"error": message})))
}

#[derive(Debug)]
struct RequestTooLarge;

impl fmt::Display for RequestTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request too large")
    }
}

impl std::error::Error for RequestTooLarge {}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(RequestTooLarge.into());
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("incomplete request"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| anyhow!("invalid content-length '{}'", value))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(RequestTooLarge.into());
    }

    let mut body = data.split_off(header_end + 4);
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("request body shorter than content-length"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_uppercase(),
        path,
        body,
    })
}

fn write_json(stream: &mut TcpStream, status: u16, body: &serde_json::Value) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    write_response(stream, status, "application/json", &payload)
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}
