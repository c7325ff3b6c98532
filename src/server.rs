//! Metrics HTTP endpoint.
//!
//! Minimal pull endpoint for Prometheus scrapes: every inbound connection
//! gets a snapshot of the store rendered by the formatter, a 200 response
//! with the text exposition content type, and then the connection is closed.
//! The request itself is read and discarded; there is nothing to route.

use crate::output::OutputFormatter;
use crate::store::ReadingStore;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Serve metrics on `listener` until the task is dropped.
///
/// Always answers 200 with whatever the store currently holds, including an
/// empty body before the first decode or after a completed scan.
pub async fn serve(
    listener: TcpListener,
    store: ReadingStore,
    formatter: Arc<dyn OutputFormatter>,
) -> io::Result<()> {
    loop {
        let (stream, _peer) = listener.accept().await?;
        let body = formatter.format(&store.snapshot());
        // One request per connection; a failed client write only affects
        // that scrape.
        let _ = respond(stream, &body).await;
    }
}

async fn respond(mut stream: TcpStream, body: &str) -> io::Result<()> {
    // Drain whatever fits in one read; the request line is not inspected.
    let mut request = [0u8; 1024];
    let _ = stream.read(&mut request).await?;

    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {CONTENT_TYPE}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::prometheus::PrometheusFormatter;
    use crate::test_utils::reading_at;

    async fn scrape(addr: std::net::SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    async fn spawn_server(store: ReadingStore) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let formatter = Arc::new(PrometheusFormatter::new("switchbot".to_string()));
        tokio::spawn(serve(listener, store, formatter));
        addr
    }

    #[tokio::test]
    async fn test_scrape_returns_readings() {
        let store = ReadingStore::new();
        store.update("Office", reading_at(23.5));
        let addr = spawn_server(store).await;

        let response = scrape(addr).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain; version=0.0.4\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.contains("switchbot_temperature{location=\"Office\",unit=\"C\"} 23.5"));
        assert!(response.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_scrape_empty_store_is_200_with_empty_body() {
        let addr = spawn_server(ReadingStore::new()).await;

        let response = scrape(addr).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 0\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_connection_closes_and_next_scrape_sees_updates() {
        let store = ReadingStore::new();
        let addr = spawn_server(store.clone()).await;

        let first = scrape(addr).await;
        assert!(!first.contains("switchbot_temperature"));

        store.update("Office", reading_at(24.0));
        let second = scrape(addr).await;
        assert!(second.contains("switchbot_temperature{location=\"Office\",unit=\"C\"} 24"));
    }
}
