//! Change detection command.
//!
//! Exits 0 when the open PR set changed since the last recorded snapshot
//! (a rebuild is warranted) and 1 when nothing changed, so schedulers can
//! gate the expensive build on this command's exit code.
use log::*;

use crate::{
    cli::Args,
    config::Config,
    forge::{github::Github, traits::Forge},
    result::Result,
    state,
};

/// Returns true when a rebuild is needed.
pub async fn execute(args: &Args) -> Result<bool> {
    let config = Config::load(&args.config)?;
    let upstream = args.upstream_remote()?;

    let forge = Github::new(upstream)?;
    let prs = forge.list_open_prs(&config.authors).await?;

    let changed = state::check_and_update(
        &config.state_file,
        &prs,
        &config.excluded_prs,
    )?;

    if changed {
        info!("changes detected: new build required");
    } else {
        info!("no changes detected: build not needed");
    }

    Ok(changed)
}
