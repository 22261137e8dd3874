//! Deployment self-check: config, output directories, FFmpeg and detector.

use std::path::Path;
use std::process::Command;

use anyhow::Context;

use argus_media::capture::IMAGE_DIR_PREFIX;
use argus_worker::watchdog::check_once;
use argus_worker::{build_detector, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("rustls crypto provider already installed"))?;
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    println!(
        "argus-selfcheck: {} source(s), detector {:?}",
        config.sources.len(),
        config.detector.kind
    );

    for source in &config.sources {
        ensure_stills_dir(&source.stills_dir)
            .await
            .with_context(|| format!("source {}", source.name))?;
    }

    if config
        .sources
        .iter()
        .any(|s| !s.source.starts_with(IMAGE_DIR_PREFIX))
    {
        ensure_tool("ffmpeg")?;
        ensure_tool("ffprobe")?;
    }

    let detector = build_detector(&config.detector).context("creating detector")?;
    match check_once(detector.as_ref())
        .await
        .context("probing detector")?
    {
        Some(celsius) => println!("argus-selfcheck: detector up, {:.1} C", celsius),
        None => println!("argus-selfcheck: detector up"),
    }

    println!("argus-selfcheck: ok");
    Ok(())
}

async fn ensure_stills_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let marker = path.join(".argus-selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .with_context(|| format!("{} is not writable", path.display()))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            name,
            output.status
        ));
    }
    Ok(())
}
