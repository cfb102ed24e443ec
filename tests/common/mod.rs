//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use portal::config::PortalConfig;
use portal::http::HttpServer;
use portal::lifecycle::Shutdown;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub const TOKEN: &str = "secret";

/// Read one request head so the client is never reset mid-write.
async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Start a mock backend answering every request with `content_type` and `body`.
pub async fn start_mock_backend(content_type: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    content_type,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a backend that answers with the request head it received.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    head.len(),
                    head
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start an event-stream backend emitting `lines` with a pause between each,
/// then closing the connection.
pub async fn start_sse_backend(lines: &'static [&'static str], pause: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for line in lines {
                    tokio::time::sleep(pause).await;
                    if socket.write_all(line.as_bytes()).await.is_err() {
                        return;
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start an event-stream backend that writes `line` every `pause` until the
/// connection breaks. The receiver yields once per connection that saw a
/// failed write.
pub async fn start_endless_sse_backend(
    line: &'static str,
    pause: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed = closed_tx.clone();
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    let _ = closed.send(());
                    return;
                }
                let chunk = format!("{:x}\r\n{}\r\n", line.len(), line);
                loop {
                    if socket.write_all(chunk.as_bytes()).await.is_err() {
                        let _ = closed.send(());
                        return;
                    }
                    tokio::time::sleep(pause).await;
                }
            });
        }
    });
    (addr, closed_rx)
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running portal; shuts down when dropped.
pub struct TestPortal {
    pub addr: SocketAddr,
    pub files_root: TempDir,
    shutdown: Shutdown,
}

impl TestPortal {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestPortal {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the portal with token [`TOKEN`] in front of `upstream`.
pub async fn start_portal(upstream: SocketAddr) -> TestPortal {
    let files_root = tempfile::tempdir().unwrap();

    let mut config = PortalConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.origin = format!("http://{}", upstream);
    config.auth.token = Some(TOKEN.to_string());
    config.terminal.shell = "/bin/sh".to_string();
    config.files.root = files_root.path().to_path_buf();
    config.backend.base_dir = files_root.path().to_path_buf();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestPortal {
        addr,
        files_root,
        shutdown,
    }
}

/// HTTP client that never follows redirects and never uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
