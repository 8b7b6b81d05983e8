//! HTTP POST sampler action.

mod client;
mod error;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use url::Url;

use crate::action::{Action, ActionError};

pub use client::HttpClient;
pub use error::{Error, HttpTransportErrorKind, Result};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: Url,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            method: http::Method::POST,
            url,
            headers: Vec::new(),
            body,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
}

/// Joins `path` onto the path of `host`, collapsing `.`/`..` segments and duplicate slashes.
///
/// Scheme, authority and query of `host` are kept.
pub fn join_url(host: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(host).map_err(|_| Error::InvalidUrl(host.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(host.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in url.path().split('/').chain(path.split('/')) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let joined = format!("/{}", segments.join("/"));
    url.set_path(&joined);
    Ok(url)
}

/// POSTs a fixed form-encoded body and expects `200 OK`.
#[derive(Debug, Clone)]
pub struct HttpPost {
    client: HttpClient,
    url: Url,
    body: Bytes,
    timeout: Option<Duration>,
    tolerate_transport_errors: bool,
}

impl HttpPost {
    pub fn new(client: HttpClient, host: &str, path: &str, data: impl Into<Bytes>) -> Result<Self> {
        Ok(Self {
            client,
            url: join_url(host, path)?,
            body: data.into(),
            timeout: None,
            tolerate_transport_errors: false,
        })
    }

    /// Per-request timeout covering the whole exchange. A timeout is a transport error.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Records transport failures as ordinary failed samples instead of aborting the run.
    #[must_use]
    pub fn tolerate_transport_errors(mut self, yes: bool) -> Self {
        self.tolerate_transport_errors = yes;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Action for HttpPost {
    async fn execute(&self) -> std::result::Result<(), ActionError> {
        let mut req = HttpRequest::post(self.url.clone(), self.body.clone());
        req.headers
            .push((CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED)));
        req.timeout = self.timeout;

        match self.client.request(req).await {
            Ok(res) if res.status == 200 => Ok(()),
            Ok(res) => Err(ActionError::failed(format!("status code {}", res.status))),
            Err(err) => {
                let kind = err.transport_error_kind();
                tracing::debug!(url = %self.url, %kind, error = %err, "http transport error");
                if self.tolerate_transport_errors {
                    Err(ActionError::failed(format!("{kind}: {err}")))
                } else {
                    Err(ActionError::fatal(err.to_string()))
                }
            }
        }
    }
}
