//! A raw TCP server that hangs up on every client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accepts connections, reads the request and closes the socket, optionally
/// after writing a truncated response.
pub struct DisconnectingServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl DisconnectingServer {
    /// Close each connection without answering.
    pub async fn start() -> Self {
        Self::spawn(&[]).await
    }

    /// Write `partial` and then close each connection.
    pub async fn start_with_partial_response(partial: &'static [u8]) -> Self {
        Self::spawn(partial).await
    }

    async fn spawn(partial: &'static [u8]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind disconnecting server");
        let addr = listener.local_addr().expect("local addr");
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&connections);
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 16 * 1024];
                let _ = stream.read(&mut buf).await;
                if !partial.is_empty() {
                    let _ = stream.write_all(partial).await;
                    let _ = stream.flush().await;
                }
                drop(stream);
            }
        });

        Self {
            addr,
            connections,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/w/api.php", self.addr)
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for DisconnectingServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
