use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use crate::run_error::RunError;

/// One sampler entry: exactly one backend key must be present.
///
/// ```yaml
/// predict:
///   http_post:
///     host: http://localhost:8000
///     path: predict
///     data: "x=1"
/// rmean:
///   rserve:
///     host: localhost
///     port: 6311
///     data: "mean(rnorm(1000))"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SamplerYaml {
    #[serde(default)]
    http_post: Option<HttpPostYaml>,
    #[serde(default)]
    rserve: Option<RserveYaml>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HttpPostYaml {
    pub host: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RserveYaml {
    pub host: String,
    pub port: u16,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Backend {
    HttpPost(HttpPostYaml),
    Rserve(RserveYaml),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpPost(_) => "http_post",
            Self::Rserve(_) => "rserve",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SamplerSpec {
    pub name: String,
    pub backend: Backend,
}

/// Parsed config file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ConfigFile {
    pub samplers: Vec<SamplerSpec>,
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<ConfigFile> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid config: {}", path.display()))
}

pub(crate) fn parse(raw: &str) -> anyhow::Result<ConfigFile> {
    let doc: serde_yaml::Value = serde_yaml::from_str(raw).context("failed to parse yaml")?;

    let mapping = match doc {
        serde_yaml::Value::Null => return Ok(ConfigFile::default()),
        serde_yaml::Value::Mapping(m) => m,
        _ => anyhow::bail!("expected a mapping of sampler name to backend"),
    };

    let mut samplers = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            other => anyhow::bail!("sampler name must be a string (got {other:?})"),
        };

        let entry: SamplerYaml = serde_yaml::from_value(value)
            .with_context(|| format!("invalid sampler `{name}`"))?;

        let backend = match (entry.http_post, entry.rserve) {
            (Some(h), None) => Backend::HttpPost(h),
            (None, Some(r)) => Backend::Rserve(r),
            (None, None) => {
                anyhow::bail!("sampler `{name}` has no backend (expected `http_post` or `rserve`)")
            }
            (Some(_), Some(_)) => {
                anyhow::bail!("sampler `{name}` must define exactly one of `http_post` or `rserve`")
            }
        };

        samplers.push(SamplerSpec { name, backend });
    }

    Ok(ConfigFile { samplers })
}

impl ConfigFile {
    /// Keeps only the named samplers. Unknown names are an error.
    pub fn retain_only(&mut self, names: &[String]) -> anyhow::Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        for n in names {
            if !self.samplers.iter().any(|s| &s.name == n) {
                anyhow::bail!("--only: no sampler named `{n}` in config");
            }
        }
        self.samplers.retain(|s| names.contains(&s.name));
        Ok(())
    }
}

/// Settings applied to every sampler while building its action.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
    pub tolerate_transport_errors: bool,
}

/// Builds samplers. Rserve connections are opened here, before any run starts.
pub(crate) async fn build_samplers(
    config: &ConfigFile,
    opts: BuildOptions,
) -> Result<Vec<smplr_core::Sampler>, RunError> {
    let client = smplr_core::HttpClient::new(Some(opts.connect_timeout));

    let mut out = Vec::with_capacity(config.samplers.len());
    for spec in &config.samplers {
        let action: Arc<dyn smplr_core::Action> = match &spec.backend {
            Backend::HttpPost(h) => {
                let post =
                    smplr_core::HttpPost::new(client.clone(), &h.host, &h.path, h.data.clone())
                        .with_context(|| format!("sampler `{}`", spec.name))
                        .map_err(RunError::InvalidInput)?
                        .with_timeout(opts.request_timeout)
                        .tolerate_transport_errors(opts.tolerate_transport_errors);
                tracing::debug!(sampler = %spec.name, url = %post.url(), "http_post sampler");
                Arc::new(post)
            }
            Backend::Rserve(r) => {
                let eval = smplr_core::RserveEval::connect(
                    &r.host,
                    r.port,
                    r.data.as_str(),
                    Some(opts.connect_timeout),
                )
                .await
                .with_context(|| format!("sampler `{}`", spec.name))
                .map_err(RunError::BackendUnavailable)?;
                tracing::debug!(sampler = %spec.name, host = %r.host, port = r.port, "rserve sampler");
                Arc::new(eval)
            }
        };
        out.push(smplr_core::Sampler::from_shared(spec.name.as_str(), action));
    }

    Ok(out)
}
