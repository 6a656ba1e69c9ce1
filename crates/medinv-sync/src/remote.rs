//! # Remote Mirror
//!
//! The remote copy of the inventory: one document per record, keyed by
//! `_id`, in a named collection.
//!
//! ## HTTP Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  connect()      GET    {base}/health                                    │
//! │  delete_all()   DELETE {base}/collections/{collection}/documents        │
//! │  insert_many()  POST   {base}/collections/{collection}/documents        │
//! │                        body: [{"_id":1,"Item":"Gauze","Doses":4}, ...]  │
//! │                                                                         │
//! │  Every request carries  x-medinv-device: <device id>                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use medinv_core::InventoryRecord;
use tracing::debug;

use crate::config::MedinvConfig;
use crate::error::{SyncError, SyncResult};

/// Header carrying the device id.
pub const DEVICE_HEADER: &str = "x-medinv-device";

/// Remote store the engine mirrors into.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Opens (or verifies) a session with the remote.
    async fn connect(&self) -> SyncResult<()>;

    /// Removes every document in the collection.
    async fn delete_all(&self) -> SyncResult<()>;

    /// Inserts the given records as documents.
    async fn insert_many(&self, records: &[InventoryRecord]) -> SyncResult<()>;
}

/// JSON-over-HTTP mirror.
#[derive(Debug, Clone)]
pub struct HttpMirror {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    device_id: String,
    timeout: Duration,
}

impl HttpMirror {
    pub fn new(
        base_url: &str,
        collection: impl Into<String>,
        device_id: impl Into<String>,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let parsed = url::Url::parse(base_url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(HttpMirror {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            device_id: device_id.into(),
            timeout,
        })
    }

    /// Builds the mirror from config. Fails if no remote URL is set.
    pub fn from_config(config: &MedinvConfig) -> SyncResult<Self> {
        let url = config
            .remote_url()
            .ok_or_else(|| SyncError::InvalidConfig("sync.remote_url is not set".into()))?;

        Self::new(
            url,
            config.sync.collection.clone(),
            config.device_id(),
            config.sync.request_timeout(),
        )
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    fn documents_url(&self) -> String {
        format!("{}/collections/{}/documents", self.base_url, self.collection)
    }

    fn request_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_secs())
        } else {
            SyncError::from(err)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> SyncResult<()> {
        let response = request
            .header(DEVICE_HEADER, self.device_id.as_str())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteMirror for HttpMirror {
    async fn connect(&self) -> SyncResult<()> {
        debug!(url = %self.base_url, "Opening remote session");
        self.send(self.client.get(self.health_url())).await
    }

    async fn delete_all(&self) -> SyncResult<()> {
        debug!(collection = %self.collection, "Clearing remote collection");
        self.send(self.client.delete(self.documents_url())).await
    }

    async fn insert_many(&self, records: &[InventoryRecord]) -> SyncResult<()> {
        debug!(collection = %self.collection, count = records.len(), "Inserting remote documents");
        self.send(self.client.post(self.documents_url()).json(records)).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::*;

    /// A request as seen by the stub server.
    #[derive(Debug)]
    struct Captured {
        request_line: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.split("\r\n").filter(|l| !l.is_empty());
        let request_line = lines.next().unwrap().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        Captured {
            request_line,
            headers,
            body: String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string(),
        }
    }

    /// Answers one request per connection with the given statuses, in order.
    async fn stub_server(statuses: Vec<u16>) -> (String, JoinHandle<Vec<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let mut captured = Vec::new();
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                captured.push(read_request(&mut socket).await);

                let body = if status < 300 { "" } else { "collection locked" };
                let reply = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            captured
        });

        (format!("http://{}", addr), task)
    }

    fn record(id: i64, name: &str, doses: i64) -> InventoryRecord {
        InventoryRecord {
            id,
            name: name.to_string(),
            dose_count: doses,
            expiry: None,
            description: None,
        }
    }

    #[test]
    fn test_urls() {
        let mirror = HttpMirror::new(
            "https://mirror.example.org/api/",
            "Inventory",
            "device-1",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(mirror.health_url(), "https://mirror.example.org/api/health");
        assert_eq!(
            mirror.documents_url(),
            "https://mirror.example.org/api/collections/Inventory/documents"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HttpMirror::new("mongodb://host", "Inventory", "d", Duration::from_secs(1)).is_err());
        assert!(HttpMirror::from_config(&MedinvConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_retryable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mirror = HttpMirror::new(
            &format!("http://{}", addr),
            "Inventory",
            "device-1",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = mirror.connect().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_wire_contract() {
        let (base, server) = stub_server(vec![200, 204, 201]).await;
        let mirror = HttpMirror::new(&base, "Inventory", "device-1", Duration::from_secs(5)).unwrap();
        let records = vec![record(1, "Gauze", 4), record(2, "Saline", 9)];

        mirror.connect().await.unwrap();
        mirror.delete_all().await.unwrap();
        mirror.insert_many(&records).await.unwrap();

        let captured = server.await.unwrap();
        assert_eq!(captured.len(), 3);
        assert!(captured[0].request_line.starts_with("GET /health "));
        assert!(captured[1]
            .request_line
            .starts_with("DELETE /collections/Inventory/documents "));
        assert!(captured[2]
            .request_line
            .starts_with("POST /collections/Inventory/documents "));
        for request in &captured {
            assert_eq!(request.header(DEVICE_HEADER), Some("device-1"));
        }

        let insert = &captured[2];
        assert!(insert
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/json")));
        let body: serde_json::Value = serde_json::from_str(&insert.body).unwrap();
        assert_eq!(body, serde_json::to_value(&records).unwrap());
        assert_eq!(body[0]["_id"], 1);
        assert_eq!(body[1]["Item"], "Saline");
        assert_eq!(body[1]["Doses"], 9);
    }

    #[tokio::test]
    async fn test_non_success_is_remote_error() {
        let (base, server) = stub_server(vec![503, 400]).await;
        let mirror = HttpMirror::new(&base, "Inventory", "device-1", Duration::from_secs(5)).unwrap();

        let err = mirror.delete_all().await.unwrap_err();
        assert!(
            matches!(err, SyncError::Remote { status: 503, ref message } if message == "collection locked"),
            "unexpected error: {err}"
        );
        assert!(err.is_retryable());

        let err = mirror.insert_many(&[record(1, "Gauze", 4)]).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { status: 400, .. }));
        assert!(!err.is_retryable());

        server.await.unwrap();
    }
}
