//! skytube — Binary Entrypoint
//! Watches one YouTube channel and announces new uploads on Bluesky.
//! The loop is deliberately single-flighted: one poll cycle runs to
//! completion before the process sleeps for the configured interval, so
//! cycles never overlap and the seen-store needs no locking.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skytube::config::Config;
use skytube::engine::run_cycle;
use skytube::publish::BlueskyPublisher;
use skytube::source::{ApiSource, RssSource};
use skytube::store::SeenStore;
use skytube::video::VideoSource;

/// Pause between consecutive posts within one cycle.
const POST_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "skytube", version, about = "YouTube to Bluesky auto-poster")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Register every currently visible video without posting, then exit.
    /// Use once at setup so only videos uploaded afterwards get announced.
    #[arg(long)]
    build_db: bool,

    /// Poll the YouTube Data API instead of the RSS feed (needs an API key)
    #[arg(long)]
    use_api: bool,

    /// Poll both the RSS feed and the Data API and reconcile the results
    #[arg(long, conflicts_with = "use_api")]
    dual: bool,

    /// Send cache-busting headers on Data API requests
    #[arg(long)]
    no_cache: bool,

    /// Run a single cycle and exit instead of looping
    #[arg(long)]
    once: bool,

    /// Also write logs to skytube.log in the working directory
    #[arg(long)]
    log: bool,
}

const LOG_FILE: &str = "skytube.log";

/// The returned guard must stay alive for the life of the process, or the
/// background writer drops buffered log lines on exit.
fn init_tracing(log_to_file: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skytube=info,warn"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact());
    if log_to_file {
        let appender = tracing_appender::rolling::never(".", LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .init();
        Some(guard)
    } else {
        registry.init();
        None
    }
}

fn build_sources(cfg: &Config, args: &Args) -> Result<Vec<Box<dyn VideoSource>>> {
    let mut sources: Vec<Box<dyn VideoSource>> = Vec::new();
    if !args.use_api {
        sources.push(Box::new(RssSource::for_channel(&cfg.youtube_channel_id)));
    }
    if args.use_api || args.dual {
        let key = cfg.youtube_api_key.as_deref().unwrap_or_default();
        sources.push(Box::new(ApiSource::new(
            &cfg.youtube_channel_id,
            key,
            cfg.api_max_results,
            args.no_cache,
        )?));
    }
    Ok(sources)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env so credentials can stay out of the config file.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = init_tracing(args.log);
    let cfg = Config::load(&args.config)?;
    cfg.validate(!args.build_db, args.use_api || args.dual)?;

    let sources = build_sources(&cfg, &args)?;
    let mut store = SeenStore::load(&cfg.seen_videos_file, cfg.on_corrupt_seen_file)?;
    info!(seen = store.len(), path = %cfg.seen_videos_file.display(), "seen-video store loaded");

    let publisher = BlueskyPublisher::new(
        &cfg.bluesky_handle,
        &cfg.bluesky_password,
        &cfg.post_template,
    );

    if args.build_db {
        let previously_known = store.len();
        let report = run_cycle(
            &sources,
            &mut store,
            &publisher,
            cfg.source_preference,
            true,
            Duration::ZERO,
        )
        .await?;
        info!(
            previously_known,
            newly_registered = report.announced,
            total = store.len(),
            "database build complete; run again without --build-db to announce only new uploads"
        );
        return Ok(());
    }

    let source_names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
    info!(
        channel = %cfg.youtube_channel_id,
        sources = ?source_names,
        interval_secs = cfg.check_interval_seconds,
        "starting monitor loop"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.check_interval_seconds));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A StoreError here is fatal: continuing without durable
                // seen-state risks duplicate announcements.
                run_cycle(
                    &sources,
                    &mut store,
                    &publisher,
                    cfg.source_preference,
                    false,
                    POST_DELAY,
                )
                .await?;
                if args.once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_flag_parses_alongside_run_modes() {
        let args = Args::try_parse_from(["skytube", "--log", "--once"]).unwrap();
        assert!(args.log);
        assert!(args.once);

        let args = Args::try_parse_from(["skytube"]).unwrap();
        assert!(!args.log);
    }

    #[test]
    fn dual_and_use_api_are_mutually_exclusive() {
        assert!(Args::try_parse_from(["skytube", "--dual", "--use-api"]).is_err());
    }
}
