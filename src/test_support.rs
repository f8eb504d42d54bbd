//! In-process HTTP stand-in for the chat backend.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A canned response served for one connection.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Extra bytes promised in `Content-Length` but never sent; the
    /// connection closes mid-body.
    pub missing_bytes: usize,
}

impl Canned {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            missing_bytes: 0,
        }
    }

    /// A response whose body is cut off after `body`.
    pub fn truncated(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            missing_bytes: 64,
            ..Self::new(status, content_type, body)
        }
    }
}

/// A minimal mock HTTP server built on tokio that returns canned responses.
pub struct MockServer {
    listener: TcpListener,
    pub base_url: String,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock server");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{port}");
        Self { listener, base_url }
    }

    /// Accept one connection, answer it, and return the raw request text.
    pub async fn respond_once(
        self,
        status: u16,
        content_type: &'static str,
        body: impl Into<String>,
    ) -> String {
        let mut requests = self
            .respond_sequence(vec![Canned::new(status, content_type, body)])
            .await;
        requests.remove(0)
    }

    /// Answer one connection per canned response, in order.
    pub async fn respond_sequence(self, responses: Vec<Canned>) -> Vec<String> {
        let mut requests = Vec::new();
        for canned in responses {
            let (mut stream, _) = self.listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);

            let response = format!(
                "HTTP/1.1 {} OK\r\n\
                 Content-Type: {}\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {}",
                canned.status,
                canned.content_type,
                canned.body.len() + canned.missing_bytes,
                canned.body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        requests
    }
}

/// Read headers plus a `Content-Length` body.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
