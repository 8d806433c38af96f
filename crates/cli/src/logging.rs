use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_NAME: &str = "cli.log";

/// Initialize logging for the CLI.
///
/// `RUST_LOG` wins over `log_level` when set. With a `log_dir` the output
/// is also written, without colors, to `cli.log` inside it.
pub fn init_logging(log_level: Level, log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = default_filter(log_level);

    match log_dir {
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let log_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(dir.join(LOG_FILE_NAME))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(log_file)
                        .with_ansi(false),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(true),
                )
                .init();
        }
    }

    Ok(())
}

fn default_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "musblossom={level_str},musblossom_core={level_str},musblossom_http={level_str},musblossom_session={level_str}"
        )
        .into()
    })
}
