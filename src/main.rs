use clap::Parser;
use log::*;
use std::process::ExitCode;

use prweave::cli;
use prweave::command;
use prweave::result::Result;

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("prweave")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

async fn run(cli_args: cli::Args) -> Result<ExitCode> {
    match &cli_args.command {
        cli::Command::Build {
            reverse,
            force,
            no_push,
        } => {
            command::build::execute(&cli_args, *reverse, *force, *no_push)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Check => {
            let changed = command::check::execute(&cli_args).await?;
            // exit 0 signals "build needed" to schedulers
            if changed {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        cli::Command::Rename { dir } => {
            command::rename::execute(&cli_args, dir)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Release { platform } => {
            command::release::execute(&cli_args, platform.as_deref())
                .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli_args = cli::Args::parse();

    initialize_logger(cli_args.debug)?;

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("interrupted");
            std::process::exit(130);
        }
    });

    run(cli_args).await
}
