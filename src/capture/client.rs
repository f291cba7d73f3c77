//! Length/finality-framed client for the local capture process
//!
//! The capture process listens on loopback TCP and answers one query with a
//! stream of framed messages. Each frame carries a u32 big-endian payload
//! length, a one-byte final flag, and the payload. The client appends
//! payloads in receipt order until it sees the final flag, then releases
//! the connection. One connection per query, never reused.

use std::io::ErrorKind;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{CellmonError, Result};

/// Upper bound for a single frame payload
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Connection lifecycle of one capture query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Ready,
    Receiving,
    Completed,
    Failed,
}

/// Single-use-per-query client for the capture process
pub struct CaptureClient {
    port: u16,
    state: ClientState,
    ready_callback: Option<Box<dyn Fn() + Send + Sync>>,
}

impl CaptureClient {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: ClientState::Disconnected,
            ready_callback: None,
        }
    }

    /// Register a callback fired once the connection is established.
    ///
    /// Callers use this to tell the capture process to start producing.
    pub fn on_ready<F>(&mut self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ready_callback = Some(Box::new(callback));
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Retrieve one batch of raw capture bytes.
    ///
    /// Opens a fresh connection, accumulates frame payloads until the final
    /// flag, and delivers exactly one terminal outcome. Connection-refused
    /// means the capture process is not running and is surfaced as the
    /// distinguished [`CellmonError::ConnectionRefused`], never retried
    /// here. Any other transport error fails the whole query with nothing
    /// delivered.
    pub async fn query(&mut self) -> Result<Vec<u8>> {
        let result = self.run_query().await;
        match &result {
            Ok(bytes) => {
                self.state = ClientState::Completed;
                debug!("Capture query completed with {} bytes", bytes.len());
            }
            Err(CellmonError::ConnectionRefused) => {
                self.state = ClientState::Failed;
                info!("Capture process not running on port {}", self.port);
            }
            Err(e) => {
                self.state = ClientState::Failed;
                warn!("Capture query failed: {}", e);
            }
        }
        result
    }

    async fn run_query(&mut self) -> Result<Vec<u8>> {
        self.state = ClientState::Connecting;

        let mut stream = TcpStream::connect(("127.0.0.1", self.port))
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::ConnectionRefused {
                    CellmonError::ConnectionRefused
                } else {
                    CellmonError::Transport(e.to_string())
                }
            })?;

        self.state = ClientState::Ready;
        if let Some(callback) = &self.ready_callback {
            callback();
        }

        self.state = ClientState::Receiving;
        let mut accumulated = Vec::new();
        loop {
            let (payload, is_final) = read_frame(&mut stream).await?;
            accumulated.extend_from_slice(&payload);
            if is_final {
                // dropping the stream releases the connection
                return Ok(accumulated);
            }
        }
    }
}

/// Read one frame: u32 BE length, u8 final flag, payload
async fn read_frame(stream: &mut TcpStream) -> Result<(Vec<u8>, bool)> {
    let mut header = [0u8; 5];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| CellmonError::Transport(e.to_string()))?;

    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let is_final = header[4] != 0;

    if len > MAX_FRAME_BYTES {
        return Err(CellmonError::Transport(format!(
            "frame too large: {} bytes",
            len
        )));
    }

    let mut payload = vec![0u8; len];
    if len > 0 {
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| CellmonError::Transport(e.to_string()))?;
    }
    Ok((payload, is_final))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn frame(payload: &[u8], is_final: bool) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.push(is_final as u8);
        out.extend_from_slice(payload);
        out
    }

    async fn spawn_server(frames: Vec<Vec<u8>>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            for f in frames {
                socket.write_all(&f).await.unwrap();
            }
        });
        port
    }

    #[tokio::test]
    async fn test_concatenates_payloads_in_order() {
        let port = spawn_server(vec![
            frame(b"AB", false),
            frame(b"C", false),
            frame(b"", false),
            frame(b"D", true),
        ])
        .await;

        let mut client = CaptureClient::new(port);
        let bytes = client.query().await.unwrap();
        assert_eq!(bytes, b"ABCD");
        assert_eq!(client.state(), ClientState::Completed);
    }

    #[tokio::test]
    async fn test_ready_callback_fires_once() {
        let port = spawn_server(vec![frame(b"x", true)]).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut client = CaptureClient::new(port);
        client.on_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.query().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_distinguished() {
        // bind to learn a free port, then close it again
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = CaptureClient::new(port);
        let err = client.query().await.unwrap_err();
        assert!(matches!(err, CellmonError::ConnectionRefused));
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[tokio::test]
    async fn test_truncated_stream_fails_without_partial_delivery() {
        // server closes after a non-final frame
        let port = spawn_server(vec![frame(b"partial", false)]).await;

        let mut client = CaptureClient::new(port);
        let err = client.query().await.unwrap_err();
        assert!(matches!(err, CellmonError::Transport(_)));
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = ((MAX_FRAME_BYTES as u32) + 1).to_be_bytes().to_vec();
            header.push(1);
            socket.write_all(&header).await.unwrap();
        });

        let mut client = CaptureClient::new(port);
        let err = client.query().await.unwrap_err();
        assert!(matches!(err, CellmonError::Transport(_)));
    }
}
