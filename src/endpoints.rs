//! Endpoint server for exposing metrics and health checks

use anyhow::Result;
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;

use crate::metrics::metrics;

/// Start the metrics endpoint server
pub async fn endpoint_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Metrics endpoint listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((mut socket, _addr)) => {
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};

                    let mut buf = [0; 1024];
                    match socket.read(&mut buf).await {
                        Ok(_) => {
                            let response = render_metrics_response();
                            let _ = socket.write_all(response.as_bytes()).await;
                        }
                        Err(e) => {
                            tracing::error!("Failed to read from socket: {}", e);
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Encode the registry into a Prometheus text exposition HTTP response
fn render_metrics_response() -> String {
    let encoder = TextEncoder::new();
    let families = metrics().registry().gather();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut body) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    let body = String::from_utf8_lossy(&body);
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_http_response() {
        // touch a counter so the exposition is non-trivial
        metrics().attempts_started.inc();
        let response = render_metrics_response();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("attempts_started"));
    }
}
