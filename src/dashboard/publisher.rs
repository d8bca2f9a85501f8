use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::store::DashboardState;
use crate::narrate::NarrationEvent;

/// Result of handing a record to a dashboard sink. Logged by the caller and
/// never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    /// A previous push was still in flight; this record was discarded.
    Dropped,
    Failed(String),
}

/// Somewhere narration records go.
pub trait EventSink: Send {
    fn name(&self) -> &'static str;

    /// Must return promptly; the frame loop calls this inline.
    fn publish(&self, event: &NarrationEvent) -> PushOutcome;

    /// Deliver anything still pending. Called once at shutdown.
    fn flush(&mut self) {}
}

impl EventSink for Arc<DashboardState> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn publish(&self, event: &NarrationEvent) -> PushOutcome {
        self.update(event.clone());
        PushOutcome::Sent
    }
}

/// Blocking `POST <url>` with a short timeout.
#[derive(Clone, Debug)]
pub struct PushClient {
    agent: ureq::Agent,
    url: String,
}

impl PushClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| anyhow!("invalid push url '{}': {}", url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("push url must be http(s), got '{}'", url));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            url: parsed.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push(&self, event: &NarrationEvent) -> PushOutcome {
        match self.agent.post(&self.url).send_json(event) {
            Ok(_) => PushOutcome::Sent,
            Err(err) => PushOutcome::Failed(err.to_string()),
        }
    }
}

/// Fire-and-forget pusher to a remote dashboard.
///
/// One record may be in flight at a time on a background thread; records
/// published meanwhile are dropped. `Sent` means the record was handed to
/// that thread.
pub struct HttpPublisher {
    tx: Option<SyncSender<NarrationEvent>>,
    join: Option<JoinHandle<()>>,
    url: String,
}

impl HttpPublisher {
    pub fn spawn(url: &str, timeout: Duration) -> Result<Self> {
        let client = PushClient::new(url, timeout)?;
        let url = client.url().to_string();
        let (tx, rx) = mpsc::sync_channel::<NarrationEvent>(1);
        let join = std::thread::Builder::new()
            .name("dashboard-push".to_string())
            .spawn(move || {
                for event in rx {
                    match client.push(&event) {
                        PushOutcome::Failed(err) => {
                            log::warn!("dashboard push to {} failed: {}", client.url(), err)
                        }
                        _ => log::debug!("dashboard push delivered"),
                    }
                }
            })?;
        log::info!("pushing narration records to {}", url);
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventSink for HttpPublisher {
    fn name(&self) -> &'static str {
        "http"
    }

    fn publish(&self, event: &NarrationEvent) -> PushOutcome {
        let Some(tx) = &self.tx else {
            return PushOutcome::Failed("publisher stopped".to_string());
        };
        match tx.try_send(event.clone()) {
            Ok(()) => PushOutcome::Sent,
            Err(TrySendError::Full(_)) => PushOutcome::Dropped,
            Err(TrySendError::Disconnected(_)) => {
                PushOutcome::Failed("push thread exited".to_string())
            }
        }
    }

    /// Close the channel and wait for the last push, bounded by the client
    /// timeout.
    fn flush(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("dashboard push thread panicked");
            }
        }
    }
}

impl Drop for HttpPublisher {
    fn drop(&mut self) {
        self.tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrate::Language;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn rejects_non_http_urls() {
        assert!(PushClient::new("ftp://example.com/update", Duration::from_millis(100)).is_err());
        assert!(PushClient::new("not a url", Duration::from_millis(100)).is_err());
    }

    #[test]
    fn unreachable_dashboard_is_a_failure_not_an_error() {
        // bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client =
            PushClient::new(&format!("http://127.0.0.1:{port}/update"), Duration::from_millis(200))
                .unwrap();
        let outcome = client.push(&NarrationEvent::empty(Language::english()));
        assert!(matches!(outcome, PushOutcome::Failed(_)));
    }

    #[test]
    fn stalled_dashboard_never_blocks_publish() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted_tx, accepted_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let server = std::thread::spawn(move || {
            // accept, read the request head, never answer
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = stream.read(&mut buf);
            accepted_tx.send(()).unwrap();
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        });

        let publisher =
            HttpPublisher::spawn(&format!("http://{addr}/update"), Duration::from_secs(3)).unwrap();
        let event = NarrationEvent::empty(Language::english());
        assert_eq!(publisher.publish(&event), PushOutcome::Sent);
        accepted_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("push reached the dashboard");

        // first record is stuck in flight; one more fits in the hand-off slot
        let started = std::time::Instant::now();
        let outcomes: Vec<PushOutcome> = (0..4).map(|_| publisher.publish(&event)).collect();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(
            outcomes,
            vec![
                PushOutcome::Sent,
                PushOutcome::Dropped,
                PushOutcome::Dropped,
                PushOutcome::Dropped
            ]
        );

        drop(publisher);
        release_tx.send(()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn publisher_delivers_record() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let mut data = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&data).contains("\"language\"") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\n{\"ok\":true}")
                .unwrap();
            String::from_utf8_lossy(&data).into_owned()
        });

        let mut publisher =
            HttpPublisher::spawn(&format!("http://{addr}/update"), Duration::from_secs(2)).unwrap();
        let event = NarrationEvent {
            speech: Some("Door ahead.".to_string()),
            ..NarrationEvent::empty(Language::english())
        };
        assert_eq!(publisher.publish(&event), PushOutcome::Sent);
        publisher.flush();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /update"));
        assert!(request.contains("Door ahead."));
        assert_eq!(
            publisher.publish(&event),
            PushOutcome::Failed("publisher stopped".to_string())
        );
    }
}
