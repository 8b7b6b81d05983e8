use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

/// Commands equal to this string are answered with an evaluation error (code 127).
pub const RSERVE_FAILING_COMMAND: &str = "stop(\"boom\")";

const GREETING: &[u8; 32] = b"Rsrv0103QAP1\r\n\r\n--------------\r\n";
const RESP_OK: u32 = 0x10001;
const RESP_ERR: u32 = 0x10002;

#[derive(Debug, Default)]
struct Shared {
    evals_total: AtomicU64,
    last_command: Mutex<Option<String>>,
}

/// Minimal QAP1 server that answers `CMD_eval` without evaluating anything.
pub struct RserveTestServer {
    port: u16,
    shared: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RserveTestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let shared = Arc::new(Shared::default());

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let accept_shared = shared.clone();
        let task = tokio::spawn(async move {
            // Dropping the set on shutdown aborts and closes every open connection.
            let mut conns = JoinSet::new();
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        conns.spawn(serve_conn(stream, accept_shared.clone()));
                    }
                }
            }
            conns.shutdown().await;
        });

        Ok(Self {
            port,
            shared,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn evals_total(&self) -> u64 {
        self.shared.evals_total.load(Ordering::Relaxed)
    }

    pub fn last_command(&self) -> Option<String> {
        self.shared
            .last_command
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RserveTestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn serve_conn(mut stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    stream.write_all(GREETING).await?;

    loop {
        let mut header = [0u8; 16];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(());
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;

        // Payload: DT_STRING param header (4 bytes) + NUL-padded command.
        let text = payload.get(4..).unwrap_or_default();
        let end = text.iter().position(|b| *b == 0).unwrap_or(text.len());
        let command = String::from_utf8_lossy(&text[..end]).to_string();

        shared.evals_total.fetch_add(1, Ordering::Relaxed);
        let failing = command == RSERVE_FAILING_COMMAND;
        *shared
            .last_command
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(command);

        let mut resp = Vec::with_capacity(24);
        if failing {
            resp.extend_from_slice(&(RESP_ERR | (0x7f << 24)).to_le_bytes());
            resp.extend_from_slice(&[0u8; 12]);
        } else {
            // SEXP holding XT_NULL: DT_SEXP(10) header with length 4, then an empty XT_NULL.
            resp.extend_from_slice(&RESP_OK.to_le_bytes());
            resp.extend_from_slice(&8u32.to_le_bytes());
            resp.extend_from_slice(&[0u8; 8]);
            resp.extend_from_slice(&(10u32 | (4 << 8)).to_le_bytes());
            resp.extend_from_slice(&0u32.to_le_bytes());
        }
        stream.write_all(&resp).await?;
    }
}
