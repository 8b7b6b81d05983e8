use std::path::Path;
use std::process::{Command, Output};

use anyhow::Context as _;
use smplr_testserver::{PATH_FAIL, PATH_FLAKY, PATH_OK, RserveTestServer, TestServer};

fn write_config(dir: &Path, yaml: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).context("write config")?;
    Ok(path)
}

async fn run_smplr(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_smplr");
    tokio::task::spawn_blocking(move || Command::new(exe).args(&args).output())
        .await
        .context("spawn_blocking join")?
        .context("run smplr binary")
}

fn describe(out: &Output) -> String {
    format!(
        "status={}\nstdout:\n{}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

fn http_config(base_url: &str, path: &str) -> String {
    format!("predict:\n  http_post:\n    host: {base_url}\n    path: {path}\n    data: \"x=1&y=2\"\n")
}

#[tokio::test]
async fn e2e_http_post_reports_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path(), &http_config(server.base_url(), PATH_OK))?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "5".into(),
        "--threads".into(),
        "2".into(),
    ])
    .await?;

    let seen = server.stats().requests_total();
    let form = server.stats().saw_form_content_type();
    let body = server.stats().last_body();
    server.shutdown().await;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.starts_with("predict\n"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("count: 5"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("error_count: 0"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("avg: "), "{}", describe(&out));
    anyhow::ensure!(seen == 5, "server saw {seen} requests\n{}", describe(&out));
    anyhow::ensure!(form == 5, "form content-type seen {form} times");
    anyhow::ensure!(body.as_deref() == Some("x=1&y=2"), "last body {body:?}");

    Ok(())
}

#[tokio::test]
async fn e2e_sequential_counts_failed_samples() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path(), &http_config(server.base_url(), PATH_FLAKY))?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "4".into(),
        "--sequential".into(),
    ])
    .await?;
    server.shutdown().await;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("mode=sequential"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("count: 4"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("error_count: 2"), "{}", describe(&out));
    anyhow::ensure!(
        stdout.matches("error=status code 503").count() == 2,
        "{}",
        describe(&out)
    );

    Ok(())
}

#[tokio::test]
async fn e2e_zero_frequency_has_no_samples() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    // Nothing is dispatched, so the host never has to exist.
    let cfg = write_config(dir.path(), &http_config("http://127.0.0.1:9", PATH_OK))?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "0".into(),
    ])
    .await?;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("count: 0"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("(no samples)"), "{}", describe(&out));

    Ok(())
}

#[tokio::test]
async fn e2e_json_output_is_ndjson() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path(), &http_config(server.base_url(), PATH_FAIL))?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "3".into(),
        "--output".into(),
        "json".into(),
    ])
    .await?;
    server.shutdown().await;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();

    let mut samples = 0;
    let mut summary = None;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let v: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("failed to parse json line: {line}"))?;
        match v.get("kind").and_then(|k| k.as_str()) {
            Some("sample") => {
                anyhow::ensure!(v["failed"] == true, "expected failed sample: {line}");
                samples += 1;
            }
            Some("summary") => summary = Some(v),
            other => anyhow::bail!("unexpected line kind {other:?}: {line}"),
        }
    }

    let summary = summary.context("missing summary line")?;
    anyhow::ensure!(samples == 3, "expected 3 sample lines\n{}", describe(&out));
    anyhow::ensure!(summary["sampler"] == "predict", "{summary}");
    anyhow::ensure!(summary["count"] == 3, "{summary}");
    anyhow::ensure!(summary["error_count"] == 3, "{summary}");

    Ok(())
}

#[tokio::test]
async fn e2e_rserve_and_only_filter() -> anyhow::Result<()> {
    let rserve = RserveTestServer::start().await.context("start rserve server")?;
    let dir = tempfile::tempdir()?;
    let yaml = format!(
        "skipped:\n  http_post: {{host: 'http://127.0.0.1:9'}}\nrmean:\n  rserve:\n    host: 127.0.0.1\n    port: {}\n    data: \"mean(rnorm(10))\"\n",
        rserve.port()
    );
    let cfg = write_config(dir.path(), &yaml)?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "6".into(),
        "--threads".into(),
        "3".into(),
        "--only".into(),
        "rmean".into(),
    ])
    .await?;

    let evals = rserve.evals_total();
    let last = rserve.last_command();
    rserve.shutdown().await;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(!stdout.contains("skipped"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("backend=rserve"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("count: 6"), "{}", describe(&out));
    anyhow::ensure!(stdout.contains("error_count: 0"), "{}", describe(&out));
    anyhow::ensure!(evals == 6, "rserve saw {evals} evals");
    anyhow::ensure!(last.as_deref() == Some("mean(rnorm(10))"), "last {last:?}");

    Ok(())
}

#[tokio::test]
async fn e2e_samplers_run_in_file_order() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let yaml = format!(
        "zulu:\n  http_post: {{host: '{base}', path: ok}}\nalpha:\n  http_post: {{host: '{base}', path: fail}}\n",
        base = server.base_url()
    );
    let cfg = write_config(dir.path(), &yaml)?;

    let out = run_smplr(vec![
        "--config".into(),
        cfg.display().to_string(),
        "--freq".into(),
        "2".into(),
    ])
    .await?;
    server.shutdown().await;

    anyhow::ensure!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let zulu = stdout.find("zulu\n").context("zulu header")?;
    let alpha = stdout.find("alpha\n").context("alpha header")?;
    anyhow::ensure!(zulu < alpha, "{}", describe(&out));
    anyhow::ensure!(stdout.contains("error_count: 2"), "{}", describe(&out));

    Ok(())
}
