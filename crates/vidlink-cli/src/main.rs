mod config;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use vidlink_api::state::AppState;
use vidlink_core::{
    notification_channel, AddOutcome, HttpMediaLoader, JsonFileStore, LinkChecker, LinkStatus,
    ListEntry, PreviewPlayer, ProbeResult, Prober, StatusIndicator, VideoList, WebhookConfig,
    WebhookDispatcher,
};

use crate::config::AppConfig;

/// Check whether video links are live, one-off or on a schedule.
#[derive(Parser)]
#[command(name = "vidlink", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Probe a single link once and exit.
    ///
    /// Exit status is 0 when live, 1 when offline and 2 when the input is invalid.
    Check {
        /// Video URL to check.
        url: String,

        /// Probe timeout in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,

        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Keep a persisted list of links and re-check it periodically (no API server).
    Watch {
        /// JSON file holding the list.
        #[arg(long, default_value_os_t = config::default_store_path())]
        store: PathBuf,

        /// Link to add before watching. Repeatable.
        #[arg(long = "add", value_name = "URL")]
        add: Vec<String>,

        /// Re-check interval in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        interval_ms: u64,

        /// Optional webhook URL to POST status changes to.
        #[arg(long)]
        webhook_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => run_serve(listen, config).await,
        Commands::Check {
            url,
            timeout_ms,
            json,
        } => {
            init_tracing("pretty", "warn");
            run_check(url, timeout_ms, json).await
        }
        Commands::Watch {
            store,
            add,
            interval_ms,
            webhook_url,
        } => {
            init_tracing("pretty", "warn");
            run_watch(store, add, interval_ms, webhook_url).await
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) -> ExitCode {
    let app_config = match config_path {
        Some(ref path) => match AppConfig::load(path) {
            Ok(c) => {
                init_tracing(&c.server.log_format, "info");
                tracing::info!(path = %path.display(), "Loaded config file");
                c
            }
            Err(e) => {
                init_tracing("pretty", "info");
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            init_tracing("pretty", "info");
            AppConfig::default()
        }
    };

    let listen = listen_override.unwrap_or(app_config.server.listen);
    let link_config = app_config.to_link_config();

    let client = match HttpMediaLoader::build_client() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let (notification_tx, notification_rx) = notification_channel();
    let webhook_handle = if !app_config.webhook.is_empty() {
        let dispatcher =
            WebhookDispatcher::new(notification_rx, app_config.webhook.clone(), client.clone());
        tracing::info!(count = app_config.webhook.len(), "Webhook dispatcher started");
        tokio::spawn(dispatcher.run())
    } else {
        tokio::spawn(async move {
            let mut rx = notification_rx;
            while rx.recv().await.is_some() {}
        })
    };

    let loader = Arc::new(HttpMediaLoader::from_config_with_client(&link_config, client));
    let store = Arc::new(JsonFileStore::new(&app_config.list.store_path));
    tracing::info!(path = %store.path().display(), "Using list store");

    let state = AppState::new(link_config, loader, store, Some(notification_tx));
    let list = state.list.clone();

    let restored = list.restore().await;
    tracing::info!(count = restored.len(), "Video list loaded");

    // The first full check can take up to one probe timeout; serve requests meanwhile.
    let startup = list.clone();
    tokio::spawn(async move {
        let summary = startup.recheck_all().await;
        tracing::info!(
            checked = summary.checked,
            live = summary.live,
            offline = summary.offline,
            "Initial check finished"
        );
        if let Err(e) = startup.start().await {
            tracing::error!(error = %e, "Failed to start periodic recheck");
        }
    });

    tracing::info!(%listen, "Starting vidlink API server");
    if let Err(e) = vidlink_api::serve_with_state(listen, state, vidlink_api::shutdown_signal()).await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown signal received, stopping periodic recheck...");
    list.stop().await;

    // Dropping the list releases the last notification sender.
    drop(list);
    match tokio::time::timeout(Duration::from_secs(5), webhook_handle).await {
        Ok(_) => tracing::info!("Webhook dispatcher shut down"),
        Err(_) => tracing::warn!("Webhook dispatcher did not shut down in time, aborting"),
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

async fn run_check(url: String, timeout_ms: u64, json: bool) -> ExitCode {
    let config = vidlink_core::LinkConfig::default()
        .with_probe_timeout(timeout_ms)
        .with_indicator_hide_delay(None);
    let loader = match HttpMediaLoader::from_config(&config) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let checker = LinkChecker::new(
        Prober::from_config(loader, &config),
        StatusIndicator::persistent(),
        PreviewPlayer::new(),
        config.accepted_extensions.clone(),
    );

    let spinner = ProgressBar::new_spinner();
    if let Ok(s) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(s);
    }
    spinner.set_message(format!("{} {}", vidlink_core::CHECKING_MESSAGE, style(&url).dim()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = checker.check(&url).await;
    spinner.finish_and_clear();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("{} {}", style("error:").red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let elapsed = report
            .elapsed_ms
            .map(|ms| format!(" {}", style(format!("({}ms)", ms)).dim()))
            .unwrap_or_default();
        println!(
            "{}  {}{}",
            status_badge(LinkStatus::from_result(&report.result)),
            report.result.message(),
            elapsed
        );
    }

    match report.result {
        ProbeResult::Live => ExitCode::SUCCESS,
        ProbeResult::Offline { .. } => ExitCode::from(1),
        ProbeResult::Invalid { .. } => ExitCode::from(2),
    }
}

async fn run_watch(
    store_path: PathBuf,
    add: Vec<String>,
    interval_ms: u64,
    webhook_url: Option<String>,
) -> ExitCode {
    let config = vidlink_core::LinkConfig::default()
        .with_recheck_interval(interval_ms)
        .with_indicator_hide_delay(None);

    let client = match HttpMediaLoader::build_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let notification_tx = webhook_url.as_ref().map(|wh_url| {
        let (tx, rx) = notification_channel();
        let dispatcher =
            WebhookDispatcher::new(rx, vec![WebhookConfig::new(wh_url.clone())], client.clone());
        tokio::spawn(dispatcher.run());
        tx
    });

    let loader = Arc::new(HttpMediaLoader::from_config_with_client(&config, client));
    let list = VideoList::new(
        config.clone(),
        Prober::from_config(loader, &config),
        Arc::new(JsonFileStore::new(&store_path)),
        StatusIndicator::persistent(),
        notification_tx,
    );

    let multi = MultiProgress::new();
    multi
        .println(format!(
            "{} {}",
            style("vidlink").bold(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
    multi
        .println(format!(
            "  {} {}",
            style("store:   ").dim(),
            style(store_path.display()).bold()
        ))
        .ok();
    multi
        .println(format!("  {} {}ms", style("interval:").dim(), interval_ms))
        .ok();
    if let Some(ref wh) = webhook_url {
        multi
            .println(format!("  {} {}", style("webhook: ").dim(), wh))
            .ok();
    }
    multi.println("").ok();
    multi
        .println(format!("{}", style("Press Ctrl+C to stop").dim()))
        .ok();
    multi.println("").ok();

    let status_bar = multi.add(ProgressBar::new_spinner());
    if let Ok(s) = ProgressStyle::with_template("{wide_msg}") {
        status_bar.set_style(s);
    }
    status_bar.set_message(format!(
        "{}\n  {}",
        format_separator(0),
        style("Checking stored links...").dim()
    ));

    list.initialize().await;
    for raw in &add {
        let outcome = list.add(raw).await;
        if let AddOutcome::Rejected { result } = &outcome {
            multi
                .println(format!(
                    "  {} {}  {}",
                    style("REJECTED").red().bold(),
                    raw,
                    result.message()
                ))
                .ok();
        }
    }

    if let Err(e) = list.start().await {
        status_bar.finish_and_clear();
        eprintln!("{} {}", style("error:").red().bold(), e);
        return ExitCode::FAILURE;
    }

    let mut last_status: HashMap<String, LinkStatus> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let shutdown = vidlink_api::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                status_bar.finish_and_clear();
                multi.println(format!("\n{}", style("Watch stopped.").dim())).ok();
                list.stop().await;
                return ExitCode::SUCCESS;
            }
        }

        let entries = list.entries().await;
        for e in &entries {
            if e.status == LinkStatus::Checking {
                continue;
            }
            let previous = last_status.insert(e.url.to_string(), e.status);
            if previous.is_some_and(|p| p != e.status) {
                let ts = e
                    .last_checked
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                multi
                    .println(format!(
                        "  {}  {}  {}  {}",
                        style(ts).dim(),
                        status_badge(e.status),
                        e.url,
                        style(&e.message).dim()
                    ))
                    .ok();
            }
        }

        status_bar.set_message(render_entries(list.probe_count(), &entries));
    }
}

fn render_entries(probe_count: u64, entries: &[ListEntry]) -> String {
    let mut lines = vec![format_separator(probe_count)];
    if entries.is_empty() {
        lines.push(format!("  {}", style("No links stored.").dim()));
    }
    for e in entries {
        let checked = e
            .last_checked
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".into());
        lines.push(format!(
            "  {}  {}  {}",
            status_badge(e.status),
            style(checked).dim(),
            e.url
        ));
    }
    lines.join("\n")
}

fn status_badge(status: LinkStatus) -> String {
    let label = format!("{:<8}", status.to_string().to_uppercase());
    match status {
        LinkStatus::Live => style(label).green().bold().to_string(),
        LinkStatus::Offline => style(label).red().bold().to_string(),
        LinkStatus::Checking => style(label).yellow().to_string(),
        LinkStatus::Hidden => style(label).dim().to_string(),
    }
}

fn format_separator(probe_count: u64) -> String {
    let label = if probe_count == 0 {
        String::new()
    } else {
        format!(" {} probes ", probe_count)
    };
    let width = 54usize.saturating_sub(label.len());
    format!(
        "{}{}{}",
        style("──").dim(),
        style(label).dim().bold(),
        style("─".repeat(width)).dim()
    )
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
