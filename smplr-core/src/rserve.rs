//! Remote command evaluation against an Rserve (QAP1) server.

mod wire;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::action::{Action, ActionError};

use wire::{GREETING_LEN, HEADER_LEN, ResponseStatus};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to rserve at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rserve connect to {0} timed out after {1:?}")]
    ConnectTimeout(String, Duration),

    #[error("rserve handshake failed: {0}")]
    Handshake(String),

    #[error("rserve requires authentication, which is not supported")]
    AuthRequired,

    #[error("rserve protocol error: {0}")]
    Protocol(String),

    #[error("command is too large ({0} bytes)")]
    CommandTooLarge(usize),

    #[error("rserve io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rserve connection is broken")]
    Broken,

    #[error("eval failed: {name} (code {code})")]
    Eval { code: u8, name: &'static str },
}

impl Error {
    /// Whether the connection can still serve further commands after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Eval { .. } | Self::CommandTooLarge(_))
    }
}

/// A single persistent QAP1 connection. Commands are serialized over it.
#[derive(Debug)]
pub struct RserveClient {
    addr: String,
    stream: Mutex<TcpStream>,
    broken: AtomicBool,
}

impl RserveClient {
    /// Connects and reads the server greeting. `timeout` bounds both steps.
    pub async fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = match timeout {
            Some(t) => tokio::time::timeout(t, handshake(host, port, &addr))
                .await
                .map_err(|_| Error::ConnectTimeout(addr.clone(), t))??,
            None => handshake(host, port, &addr).await?,
        };

        tracing::debug!(%addr, "rserve connected");
        Ok(Self {
            addr,
            stream: Mutex::new(stream),
            broken: AtomicBool::new(false),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Evaluates `command` and discards the result value.
    pub async fn eval(&self, command: &str) -> Result<()> {
        let msg = wire::encode_eval(command)?;
        let mut stream = self.stream.lock().await;
        // Checked under the lock: a caller queued behind a failed exchange must not reuse the stream.
        if self.broken.load(Ordering::Acquire) {
            return Err(Error::Broken);
        }

        let res = exchange(&mut stream, &msg).await;
        if let Err(err) = &res
            && !err.is_recoverable()
        {
            // The stream position is unknown now; nothing else may use it.
            self.broken.store(true, Ordering::Release);
        }
        res
    }
}

async fn handshake(host: &str, port: u16, addr: &str) -> Result<TcpStream> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| Error::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;

    let mut id = [0u8; GREETING_LEN];
    stream.read_exact(&mut id).await?;
    wire::check_greeting(&id)?;
    Ok(stream)
}

async fn exchange(stream: &mut TcpStream, msg: &[u8]) -> Result<()> {
    stream.write_all(msg).await?;

    let mut raw = [0u8; HEADER_LEN];
    stream.read_exact(&mut raw).await?;
    let header = wire::decode_response_header(&raw)?;

    let mut payload = (&mut *stream).take(header.payload_len);
    let skipped = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
    if skipped != header.payload_len {
        return Err(Error::Protocol(format!(
            "response truncated ({skipped} of {} bytes)",
            header.payload_len
        )));
    }

    match header.status {
        ResponseStatus::Ok => Ok(()),
        ResponseStatus::Err(code) => Err(Error::Eval {
            code,
            name: wire::error_code_name(code),
        }),
    }
}

/// Evaluates a fixed command on a shared connection.
#[derive(Debug, Clone)]
pub struct RserveEval {
    client: Arc<RserveClient>,
    command: Arc<str>,
}

impl RserveEval {
    pub fn new(client: Arc<RserveClient>, command: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            command: command.into(),
        }
    }

    /// Opens the connection up front; failure here means the sampler cannot be built.
    pub async fn connect(
        host: &str,
        port: u16,
        command: impl Into<Arc<str>>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = RserveClient::connect(host, port, timeout).await?;
        Ok(Self::new(Arc::new(client), command))
    }
}

#[async_trait]
impl Action for RserveEval {
    async fn execute(&self) -> std::result::Result<(), ActionError> {
        match self.client.eval(&self.command).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_recoverable() => {
                tracing::debug!(addr = self.client.addr(), error = %err, "rserve command failed");
                Err(ActionError::failed(err.to_string()))
            }
            Err(err) => Err(ActionError::fatal(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use smplr_testserver::RserveTestServer;

    #[tokio::test]
    async fn eval_round_trip() {
        let server = RserveTestServer::start().await.unwrap();
        let action = RserveEval::connect("127.0.0.1", server.port(), "1+1", None)
            .await
            .unwrap();

        assert_eq!(action.execute().await, Ok(()));
        assert_eq!(action.execute().await, Ok(()));
        assert_eq!(server.evals_total(), 2);
        assert_eq!(server.last_command().as_deref(), Some("1+1"));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn eval_error_is_recoverable() {
        let server = RserveTestServer::start().await.unwrap();
        let action = RserveEval::connect(
            "127.0.0.1",
            server.port(),
            smplr_testserver::RSERVE_FAILING_COMMAND,
            None,
        )
        .await
        .unwrap();

        let err = action.execute().await.unwrap_err();
        assert!(!err.is_fatal(), "{err}");
        assert!(err.to_string().contains("code 127"), "{err}");

        // The connection stays usable after an eval error.
        let err = action.execute().await.unwrap_err();
        assert!(!err.is_fatal(), "{err}");
        assert_eq!(server.evals_total(), 2);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_connection_is_fatal() {
        let server = RserveTestServer::start().await.unwrap();
        let action = RserveEval::connect("127.0.0.1", server.port(), "1+1", None)
            .await
            .unwrap();
        server.shutdown().await;

        assert!(action.execute().await.unwrap_err().is_fatal());
        // Once broken, the client refuses to reuse the stream.
        let err = action.execute().await.unwrap_err();
        assert_eq!(err, ActionError::fatal("rserve connection is broken"));
    }

    #[tokio::test]
    async fn connect_refused_is_reported() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = RserveEval::connect("127.0.0.1", port, "1+1", Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }), "{err}");
    }

    #[tokio::test]
    async fn silent_server_times_out_during_greeting() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            // Hold the accepted socket open without ever writing the greeting.
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let res = tokio::time::timeout(
            Duration::from_secs(2),
            RserveEval::connect("127.0.0.1", port, "1+1", Some(Duration::from_millis(200))),
        )
        .await;
        accept.abort();

        let err = res.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectTimeout(..)), "{err}");
    }

    #[tokio::test]
    async fn waiter_sees_broken_stream_after_acquiring_lock() {
        let server = RserveTestServer::start().await.unwrap();
        let client = RserveClient::connect("127.0.0.1", server.port(), None)
            .await
            .unwrap();

        // Break the stream while a second caller is queued on the lock.
        let guard = client.stream.lock().await;
        let waiter = client.eval("1+1");
        tokio::pin!(waiter);
        assert!(poll_once(waiter.as_mut()).await.is_none());
        client.broken.store(true, Ordering::Release);
        drop(guard);

        assert!(matches!(waiter.await, Err(Error::Broken)));
        assert_eq!(server.evals_total(), 0);

        server.shutdown().await;
    }

    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(v) => Some(v),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }
}
