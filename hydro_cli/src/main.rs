#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod cli;
mod error_fmt;
mod run;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, FILE_GUARD};

fn init_logging(cli: &Cli, logging: &hydro_config::Logging) -> eyre::Result<()> {
    use eyre::WrapErr;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    // CLI level wins; the config's [logging] level fills the default.
    let level = if cli.log_level == "info" {
        logging.level.as_deref().unwrap_or("info")
    } else {
        &cli.log_level
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level}"))?;

    let file_layer = match &logging.file {
        Some(file) => {
            let path = std::path::Path::new(file);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().map_or_else(
                || std::ffi::OsString::from("hydro.log"),
                std::ffi::OsStr::to_os_string,
            );
            let rotation = match logging.rotation.as_deref() {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let appender = RollingFileAppender::new(
                rotation,
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer))
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if cli.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

fn try_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = run::load_config(&cli.config)?;
    init_logging(cli, &cfg.logging)?;
    run::dispatch(cli, &cfg)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = color_eyre::install();

    match try_main(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.json {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            ExitCode::from(error_fmt::exit_code_for_error(&err))
        }
    }
}
