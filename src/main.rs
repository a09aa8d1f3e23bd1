use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use sheetpulse::{
    config::{Config, ENV_CONFIG, USAGE},
    fetch::HttpFeed,
    metrics::{memo::DerivedMemo, Metrics, SeriesSet},
    relay::ChatRelay,
    source::{DataSource, FetchState, FetchStatus},
};
use std::env;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

#[derive(Serialize)]
struct Summary<'a> {
    updated_at: Option<DateTime<Utc>>,
    rows: usize,
    metrics: &'a Metrics,
    conversion_rate: String,
    series: &'a SeriesSet,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sheetpulse=debug"));
    if let Ok(level) = env::var("LOG_LEVEL") {
        match level.parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("ignoring LOG_LEVEL={level}: {e}"),
        }
    }
    fmt::Subscriber::builder().with_env_filter(filter).init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let arg = env::args().nth(1);
    if matches!(arg.as_deref(), Some("-h" | "--help")) {
        print!("{}", USAGE);
        return Ok(());
    }
    let config = match arg.or_else(|| env::var(ENV_CONFIG).ok()) {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path))?,
        None => Config::from_env().context("reading config from environment")?,
    };
    info!(
        feed = %config.feed_url,
        interval_secs = config.refresh_interval_secs,
        chat = config.webhook_url.is_some(),
        "configured"
    );
    if let Some(hint) = config.chat_disabled_hint() {
        info!("{}", hint);
    }

    // ─── 3) wire feed, source and relay ──────────────────────────────
    let feed = HttpFeed::new(config.feed_url.clone(), config.request_timeout())
        .context("building HTTP client")?;
    let relay = match &config.webhook_url {
        Some(url) => Some(ChatRelay::new(url.clone(), config.request_timeout())?),
        None => None,
    };
    let source = DataSource::activate(feed, config.source_options());

    // ─── 4) render snapshots; r = refresh, q = quit, other text = chat ─
    let mut updates = source.updates();
    let mut memo = DerivedMemo::new();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut replies: JoinSet<Option<String>> = JoinSet::new();

    loop {
        tokio::select! {
            Some(state) = updates.next() => report(&state, &mut memo),
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "" => {}
                    "r" | "refresh" => {
                        info!("manual refresh");
                        source.refresh();
                    }
                    "q" | "quit" => break,
                    text => match &relay {
                        Some(relay) => relay.dispatch(text.to_string(), &mut replies),
                        None => warn!("no webhook configured; chat input ignored"),
                    },
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin unreadable; commands disabled");
                    stdin_open = false;
                }
            },
            Some(joined) = replies.join_next() => match joined {
                Ok(Some(reply)) => println!("bot: {}", reply),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "chat task failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt");
                break;
            }
        }
    }

    // ─── 5) stop polling and drop pending chat calls before exit ─────
    if !replies.is_empty() {
        debug!(pending = replies.len(), "abandoning chat replies");
    }
    replies.shutdown().await;
    source.deactivate().await;
    info!("all done");
    Ok(())
}

fn report(state: &FetchState, memo: &mut DerivedMemo) {
    match state.status {
        FetchStatus::Idle => {}
        FetchStatus::Loading => debug!(request = state.request_id, "syncing"),
        FetchStatus::Success => {
            let derived = memo.get(&state.rows);
            let m = &derived.metrics;
            info!(
                clients = m.total_clients,
                products = m.total_products,
                revenue = m.total_revenue,
                delivered = m.delivered_count,
                in_progress = m.in_progress_count,
                conversion = %m.conversion_rate_display(),
                "dashboard updated"
            );
            let summary = Summary {
                updated_at: state.last_success,
                rows: state.rows.len(),
                metrics: m,
                conversion_rate: m.conversion_rate_display(),
                series: &derived.series,
            };
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => error!(error = %e, "could not serialise summary"),
            }
        }
        FetchStatus::Error => warn!(
            error = state.error_message.as_deref().unwrap_or("unknown error"),
            stale_rows = state.rows.len(),
            "feed unavailable; type r to retry"
        ),
    }
}
