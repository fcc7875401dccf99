//! Standalone token-rename command.
use color_eyre::eyre::eyre;
use log::*;
use std::path::Path;

use crate::{cli::Args, config::Config, result::Result, rewrite::Rewriter};

pub fn execute(args: &Args, dir: &Path) -> Result<()> {
    let config = Config::load(&args.config)?;

    let Some(rename) = &config.rename else {
        return Err(eyre!(
            "no [rename] table configured in {}",
            args.config.display()
        ));
    };

    if !dir.is_dir() {
        return Err(eyre!("not a directory: {}", dir.display()));
    }

    info!(
        "renaming {} -> {}{} under {}",
        rename.token,
        rename.token,
        rename.suffix,
        dir.display()
    );

    let rewriter = Rewriter::new(rename)?;
    rewriter.rewrite_tree(dir)?;

    Ok(())
}
