// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tender_watch::error::{DeliveryError, SourceError};
use tender_watch::ingest::{Listing, PollCfg, QueryParams, Tender, TenderSource};
use tender_watch::{Notification, Notifier};

/// Replays a fixed script of fetch outcomes. Once the script is used up it
/// keeps returning `fallback` (or an error when there is none).
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<Listing, SourceError>>>,
    fallback: Option<Listing>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Result<Listing, SourceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn then_always(mut self, listing: Listing) -> Self {
        self.fallback = Some(listing);
        self
    }
}

#[async_trait::async_trait]
impl TenderSource for ScriptedSource {
    async fn fetch(&self, _params: &QueryParams) -> Result<Listing, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(r) => r,
            None => match &self.fallback {
                Some(l) => Ok(l.clone()),
                None => Err(SourceError::Status {
                    status: 503,
                    body: "script exhausted".into(),
                }),
            },
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn fail() -> Result<Listing, SourceError> {
    Err(SourceError::Status {
        status: 500,
        body: "boom".into(),
    })
}

pub fn tenders(items: &[(&str, &str)]) -> Listing {
    items.iter().map(|(id, name)| Tender::new(*id, *name)).collect()
}

pub fn fast(max_retries: u32) -> PollCfg {
    PollCfg {
        period: Duration::from_millis(1),
        max_retries,
    }
}

/// Records every notification it is asked to send.
#[derive(Clone, Default)]
pub struct Recorder {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.text.clone()).collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for Recorder {
    async fn send(&self, msg: &Notification) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Rejects everything.
#[derive(Clone, Default)]
pub struct Broken {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Notifier for Broken {
    async fn send(&self, _msg: &Notification) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Rejected {
            channel: "broken",
            status: 500,
            body: "down".into(),
        })
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Single-request HTTP server on localhost. Answers the first request with
/// `status` and `body`, then resolves to the raw request text it received.
pub async fn http_stub(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let request = read_request(&mut sock).await;
        let reply = if status == 204 {
            "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string()
        } else {
            format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                reason(status),
                body.len()
            )
        };
        sock.write_all(reply.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
        request
    });
    (format!("http://{addr}"), task)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

// Reads the head plus `Content-Length` bytes of body.
async fn read_request(sock: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
