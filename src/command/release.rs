//! Release publishing command: create the dated prerelease and attach
//! build artifacts plus the merge report.
use chrono::Local;
use color_eyre::eyre::eyre;
use log::*;
use std::fs;

use crate::{
    cli::Args,
    config::Config,
    forge::github::Github,
    publish,
    result::Result,
};

pub async fn execute(args: &Args, platform: Option<&str>) -> Result<()> {
    let config = Config::load(&args.config)?;
    let fork = args.fork_remote()?;

    if !config.dist_dir.is_dir() {
        return Err(eyre!(
            "dist directory does not exist: {}",
            config.dist_dir.display()
        ));
    }

    let artifacts = publish::collect_artifacts(&config.dist_dir, platform)?;
    if artifacts.is_empty() {
        return Err(eyre!(
            "no artifact zip files found in {}",
            config.dist_dir.display()
        ));
    }

    info!("found {} artifact(s) to upload", artifacts.len());

    let date_stamp = Local::now().format("%y%m%d").to_string();
    let tag = config.release_tag(&date_stamp);
    let report_path = config.report_path(&date_stamp);
    let report_content = fs::read_to_string(&report_path).ok();

    if report_content.is_none() {
        warn!("no report found at {}", report_path.display());
    }

    let forge = Github::new(fork)?;
    let body = publish::release_body(&tag, report_content.as_deref());
    let name = format!("{} - Weekly Build", tag);

    let release =
        publish::ensure_release(&forge, &tag, &name, body).await?;

    let mut files = artifacts;
    if report_content.is_some() {
        files.push(report_path);
    }

    let uploaded =
        publish::upload_assets(&forge, release.id, &files).await?;

    info!(
        "release {} ready with {uploaded} new asset(s): {}",
        tag, release.html_url
    );

    Ok(())
}
