use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Utc};
use env_logger::Builder;
use log::LevelFilter;
use ratiotrade::config::TraderConfig;
use ratiotrade::ports::replay_feed::JsonLinesFeed;
use ratiotrade::runner::TradingLoop;
use ratiotrade::trade::execution::gateway_box::GatewayBox;
use std::env;
use std::io::Write;
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with local timezone
    let offset_seconds = env::var("TIMEZONE_OFFSET")
        .unwrap_or_else(|_| "0".to_string())
        .parse::<i32>()
        .map_err(|e| anyhow!("invalid TIMEZONE_OFFSET: {}", e))?;
    let offset = FixedOffset::east_opt(offset_seconds)
        .ok_or_else(|| anyhow!("TIMEZONE_OFFSET out of range: {}", offset_seconds))?;
    Builder::from_default_env()
        .format(move |buf, record| {
            let utc_now: DateTime<Utc> = Utc::now();
            let local_now = utc_now.with_timezone(&offset);
            writeln!(
                buf,
                "{} [{}] - {}",
                local_now.format("%Y-%m-%dT%H:%M:%S%z"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            LevelFilter::from_str(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
                .unwrap_or(LevelFilter::Info),
        )
        // Logs go to stderr so the stdout gateway owns stdout.
        .target(env_logger::Target::Stderr)
        .init();

    let git_hash = option_env!("RATIOTRADE_GIT_HASH").unwrap_or("unknown");
    log::info!("ratiotrade git: {}", git_hash);

    let cfg = TraderConfig::from_env_or_yaml()?;
    let gateway = GatewayBox::create(&cfg);
    let mut runner = TradingLoop::from_config(&cfg, gateway)?;

    let summary = match &cfg.replay_file {
        Some(path) => {
            log::info!("Starting ratio trader on replay {}...", path);
            let mut feed = JsonLinesFeed::open(path).await?;
            runner.run(&mut feed).await?
        }
        None => {
            log::info!("Starting ratio trader on stdin...");
            let mut feed = JsonLinesFeed::stdin();
            runner.run(&mut feed).await?
        }
    };
    match serde_json::to_string(&summary) {
        Ok(json) => log::info!("Finished: {}", json),
        Err(e) => log::warn!("Finished, summary not encodable: {}", e),
    }
    Ok(())
}
