//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use family_copilot::apiservice::{self, ApiState};
use family_copilot::config::{Environment, ResilienceConfig, ServiceConfig};
use family_copilot::lifecycle::Shutdown;
use family_copilot::web;

/// Bind a loopback listener on an ephemeral port.
pub async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Resilience settings with short delays so tests stay fast.
pub fn fast_resilience() -> ResilienceConfig {
    ResilienceConfig {
        total_timeout_secs: 10,
        attempt_timeout_secs: 5,
        max_retries: 3,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 50,
        ..ResilienceConfig::default()
    }
}

pub fn service_config(name: &str, environment: Environment) -> ServiceConfig {
    let mut config = ServiceConfig::named(name);
    config.environment = environment;
    config.http_client.resilience = fast_resilience();
    config
}

/// Run the forecast API in the background.
pub async fn spawn_apiservice(environment: Environment) -> (SocketAddr, Shutdown) {
    let (listener, addr) = ephemeral_listener().await;
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let config = service_config(apiservice::SERVICE_NAME, environment);
    tokio::spawn(async move {
        let _ = apiservice::serve(listener, config, ApiState::default(), signal).await;
    });
    (addr, shutdown)
}

/// Run the web frontend in the background.
pub async fn spawn_webfrontend(config: ServiceConfig) -> (SocketAddr, Shutdown) {
    let (listener, addr) = ephemeral_listener().await;
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = web::serve(listener, config, signal).await;
    });
    (addr, shutdown)
}

/// Plain client that does not keep idle connections between tests.
pub fn plain_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn drain_request(socket: &mut TcpStream) {
    let mut buf = vec![0u8; 4096];
    let mut seen = Vec::new();
    while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => seen.extend_from_slice(&buf[..n]),
        }
    }
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        408 => "408 Request Timeout",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Backend whose answer is computed per request.
///
/// Returns the address and the number of requests accepted so far.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let (listener, addr) = ephemeral_listener().await;
    let f = Arc::new(f);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                drain_request(&mut socket).await;
                let (status, body) = f().await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

/// Backend streaming `chunks` with chunked transfer encoding.
///
/// With `stall` the body is never terminated: the connection stays open
/// after the last chunk, like a server still producing output.
pub async fn start_chunked_backend(chunks: Vec<String>, stall: bool) -> SocketAddr {
    let (listener, addr) = ephemeral_listener().await;
    let chunks = Arc::new(chunks);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let chunks = chunks.clone();
            tokio::spawn(async move {
                drain_request(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for chunk in chunks.iter() {
                    let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    if socket.write_all(frame.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                if stall {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                } else {
                    let _ = socket.write_all(b"0\r\n\r\n").await;
                    let _ = socket.shutdown().await;
                }
            });
        }
    });

    addr
}

/// One forecast element as the API would serialize it.
pub fn forecast_json(date: &str, temperature_c: i32, summary: &str) -> String {
    format!(
        r#"{{"date":"{date}","temperatureC":{temperature_c},"summary":"{summary}","temperatureF":{}}}"#,
        32 + (f64::from(temperature_c) / 0.5556) as i32
    )
}
