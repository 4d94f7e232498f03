use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use digit_scope::analysis::AnalysisEngine;
use digit_scope::config::Config;
use digit_scope::deriv::types::{
    api_error, msg_type, parse_active_symbols, parse_tick, MSG_ACTIVE_SYMBOLS, MSG_TICK,
    MSG_WILDCARD,
};
use digit_scope::deriv::{DerivWsClient, ReconnectPolicy};
use digit_scope::error::AppError;
use digit_scope::event::WsConnectionStatus;
use digit_scope::model::signal::Signal;
use digit_scope::model::tick::Tick;

const FEED_CHANNEL_CAPACITY: usize = 256;
const MIN_REPORT_INTERVAL_MS: u64 = 100;

#[derive(Debug)]
enum FeedEvent {
    Tick(Tick),
    PipSize(u32),
}

/// Queue an event for the report loop without blocking the socket task.
/// Returns `false` and warns when the event had to be dropped.
fn forward(tx: &mpsc::Sender<FeedEvent>, event: FeedEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(FeedEvent::Tick(_))) => {
            tracing::warn!("Tick channel full, dropping tick");
            false
        }
        Err(mpsc::error::TrySendError::Full(FeedEvent::PipSize(pip_size))) => {
            tracing::warn!(pip_size, "Tick channel full, dropping pip size update");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn log_signal(signal: &Signal) {
    tracing::info!(
        kind = signal.kind.as_str(),
        status = signal.status.as_str(),
        probability = signal.probability,
        target_digit = ?signal.target_digit,
        entry = %signal.entry_condition,
        "{}",
        signal.recommendation
    );
}

fn report(engine: &AnalysisEngine) {
    if engine.is_empty() {
        tracing::info!("Waiting for ticks");
        return;
    }

    let analysis = engine.analyze();
    tracing::info!(
        total_ticks = analysis.total_ticks,
        current_digit = ?engine.current_digit(),
        even_pct = analysis.even_percentage,
        odd_pct = analysis.odd_percentage,
        high_pct = analysis.high_percentage,
        low_pct = analysis.low_percentage,
        entropy = analysis.entropy,
        strongest = analysis.power_index.strongest,
        weakest = analysis.power_index.weakest,
        gap = analysis.power_index.gap,
        missing = ?analysis.missing_digits,
        "Digit analysis"
    );

    for signal in engine
        .signals()
        .iter()
        .chain(engine.pro_signals().iter())
        .filter(|s| s.is_actionable())
    {
        log_signal(signal);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+). A provider
    // that is already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists or DIGIT_SCOPE_CONFIG points to a config file");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let ws_url = config.deriv.ws_url().context("deriv.ws_base_url is invalid")?;
    tracing::info!(
        symbol = %config.deriv.symbol,
        ws_url = %ws_url,
        window_size = config.analysis.window_size,
        "Starting digit-scope"
    );

    let mut engine = AnalysisEngine::new(config.analysis.window_size);
    engine.set_pip_size(config.deriv.pip_size);

    let client = DerivWsClient::new(ws_url, ReconnectPolicy::from(&config.reconnect));
    let (feed_tx, mut feed_rx) = mpsc::channel::<FeedEvent>(FEED_CHANNEL_CAPACITY);

    let tick_tx = feed_tx.clone();
    let tick_sub = client.subscribe(MSG_TICK, move |msg| match parse_tick(msg) {
        Ok(tick) => {
            forward(&tick_tx, FeedEvent::Tick(tick));
        }
        // API errors are reported by the wildcard handler.
        Err(AppError::DerivApi { .. }) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to decode tick frame"),
    });

    let wanted_symbol = config.deriv.symbol.clone();
    let symbols_sub = client.subscribe(MSG_ACTIVE_SYMBOLS, move |msg| {
        match parse_active_symbols(msg) {
            Ok(symbols) => {
                tracing::info!(count = symbols.len(), "Received active symbols");
                let pip_size = symbols
                    .iter()
                    .find(|s| s.symbol == wanted_symbol)
                    .and_then(|s| s.pip_size());
                if let Some(pip_size) = pip_size {
                    forward(&feed_tx, FeedEvent::PipSize(pip_size));
                }
            }
            Err(AppError::DerivApi { .. }) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to decode active symbols"),
        }
    });

    let errors_sub = client.subscribe(MSG_WILDCARD, |msg| {
        if let Some(err) = api_error(msg) {
            tracing::warn!(
                msg_type = msg_type(msg).unwrap_or("unknown"),
                code = %err.code,
                "Deriv API error: {}",
                err.message
            );
        }
    });

    // Subscriptions die with the socket, so subscribe again on every connect.
    let status_client = client.clone();
    let status_symbol = config.deriv.symbol.clone();
    let status_sub = client.on_connection_status(move |status| match status {
        WsConnectionStatus::Connected => {
            status_client.get_active_symbols();
            status_client.subscribe_ticks(&status_symbol);
        }
        WsConnectionStatus::Disconnected => tracing::warn!("Tick feed disconnected"),
        WsConnectionStatus::Reconnecting { attempt, delay_ms } => {
            tracing::info!(attempt, delay_ms, "Tick feed reconnecting")
        }
    });

    if let Err(e) = client.connect().await {
        tracing::warn!(error = %e, "Initial connection failed, retrying in background");
    }

    let mut report_interval = tokio::time::interval(Duration::from_millis(
        config.analysis.report_interval_ms.max(MIN_REPORT_INTERVAL_MS),
    ));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = feed_rx.recv() => {
                match event {
                    Some(FeedEvent::Tick(tick)) => {
                        if !tick.symbol.is_empty() && tick.symbol != config.deriv.symbol {
                            tracing::debug!(symbol = %tick.symbol, "Ignoring tick for other symbol");
                            continue;
                        }
                        let digit = engine.add_tick(tick);
                        tracing::debug!(digit, window = engine.len(), "Tick ingested");
                    }
                    Some(FeedEvent::PipSize(pip_size)) => {
                        if pip_size != engine.pip_size() {
                            tracing::info!(pip_size, "Using pip size from symbol metadata");
                            engine.set_pip_size(pip_size);
                        }
                    }
                    None => {
                        tracing::info!("Feed channel closed");
                        break;
                    }
                }
            }
            _ = report_interval.tick() => report(&engine),
            _ = &mut shutdown => {
                tracing::info!("Ctrl+C received");
                break;
            }
        }
    }

    client.unsubscribe_ticks();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.disconnect();

    // Handlers hold a client clone; drop them to release the connection state.
    status_sub.unsubscribe();
    tick_sub.unsubscribe();
    symbols_sub.unsubscribe();
    errors_sub.unsubscribe();

    tracing::info!("Shutdown complete");
    Ok(())
}
