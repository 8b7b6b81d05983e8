use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use super::{Error, HttpRequest, HttpResponse, Result};

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // Without a connect timeout an unreachable host stalls a worker for the OS default,
        // which can be tens of seconds.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        connector.set_nodelay(true);

        let inner = Client::builder(TokioExecutor::new()).build(connector);
        Self { inner }
    }

    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout;
        if req.url.scheme() != "http" {
            return Err(Error::UnsupportedScheme(req.url.to_string()));
        }

        let uri: hyper::Uri = req
            .url
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);
        if !req.body.is_empty() {
            builder = builder.header(http::header::CONTENT_LENGTH, req.body.len());
        }
        for (name, value) in req.headers {
            builder = builder.header(name, value);
        }
        let req: Request<Full<Bytes>> = builder.body(Full::new(req.body))?;

        let exchange = async {
            let res: hyper::Response<Incoming> = self.inner.request(req).await?;
            let (parts, body) = res.into_parts();
            // Drain the body so the connection goes back to the pool.
            body.collect().await?;
            Ok::<_, Error>(HttpResponse {
                status: parts.status.as_u16(),
            })
        };

        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => exchange.await,
        }
    }
}
