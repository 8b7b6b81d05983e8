use anyhow::Context as _;

use crate::cli::Cli;
use crate::config::{self, BuildOptions};
use crate::exit_codes::ExitCode;
use crate::output::{self, RunHeader};
use crate::run_error::RunError;

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let out = output::formatter(cli.output);

    let mut file = config::load(&cli.config)
        .await
        .map_err(RunError::InvalidInput)?;
    file.retain_only(&cli.only).map_err(RunError::InvalidInput)?;

    let cfg = run_config(&cli);
    cfg.validate()
        .context("invalid run config")
        .map_err(RunError::InvalidInput)?;

    if file.samplers.is_empty() {
        tracing::warn!(config = %cli.config.display(), "no samplers configured");
        return Ok(ExitCode::Success);
    }

    let samplers = config::build_samplers(
        &file,
        BuildOptions {
            connect_timeout: cli.connect_timeout,
            request_timeout: cli.timeout,
            tolerate_transport_errors: cli.tolerate_transport_errors,
        },
    )
    .await?;

    let mut error_count = 0u64;
    for (spec, sampler) in file.samplers.iter().zip(samplers) {
        out.print_header(&RunHeader {
            sampler: &spec.name,
            backend: spec.backend.kind(),
            config: cfg,
        });

        let listener = smplr_core::ReportListener::new().with_sample_fn(out.sample_fn());
        let summary = smplr_core::ThreadGroup::new(sampler, cfg)?
            .start(listener)
            .await
            .map_err(|err| {
                let abort = err.is_aborted();
                let err = anyhow::Error::new(err).context(format!("sampler `{}`", spec.name));
                if abort {
                    RunError::SamplerAborted(err)
                } else {
                    RunError::RuntimeError(err)
                }
            })?;

        out.print_summary(&spec.name, &summary)
            .map_err(RunError::RuntimeError)?;
        error_count += summary.error_count;
    }

    tracing::info!(error_count, "all samplers finished");
    Ok(ExitCode::from_sample_errors(error_count, cli.fail_on_errors))
}

fn run_config(cli: &Cli) -> smplr_core::RunConfig {
    if cli.sequential {
        smplr_core::RunConfig::sequential(cli.freq)
    } else {
        smplr_core::RunConfig::pooled(cli.freq, cli.threads)
    }
}
