//! Command handlers
//!
//! This module implements the handlers for the CLI commands:
//! - chat: interactive conversation REPL over a ChatController
//! - feed: run the telemetry feed and print snapshot lines
//! - doctor: validate configuration and check dependencies

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatController, Message, ResponseMode, SessionParams, SubmitOutcome};
use crate::config::Config;
use crate::llm::{openai::OpenAiProvider, ModelProvider};
use crate::locale::Locale;
use crate::memory::{FileMemoryStore, Memory, MemoryStore};
use crate::policy::Audience;
use crate::secrets::SecretString;
use crate::signals::aggregator::SignalAggregator;
use crate::signals::feed::{run_feed, PolledSource, SimulatedSource, TelemetrySource};
use crate::signals::SignalSnapshot;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message.text),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
        ),
    }
}

fn format_feed_line(snapshot: &SignalSnapshot, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let values: Vec<String> = snapshot
                .values
                .iter()
                .map(|(channel, value)| format!("{channel}={value:.1}"))
                .collect();
            format!(
                "{} quality={:3.0}% {}",
                Utc::now().format("%H:%M:%S"),
                snapshot.quality * 100.0,
                values.join(" ")
            )
        }
        OutputFormat::Json => {
            serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

fn build_source(config: &Config) -> Box<dyn TelemetrySource> {
    match &config.signals.feed_url {
        Some(url) => Box::new(PolledSource::new(url.clone())),
        None => Box::new(SimulatedSource::new()),
    }
}

fn build_aggregator(config: &Config) -> SignalAggregator {
    SignalAggregator::new(
        config.signals.history_capacity,
        config.signals.quality_band_low,
        config.signals.quality_band_high,
    )
}

fn session_params(config: &Config, mode_override: Option<&str>) -> Result<SessionParams> {
    let mode = match mode_override {
        Some(raw) => raw.parse::<ResponseMode>().map_err(anyhow::Error::msg)?,
        None => ResponseMode::Local,
    };

    Ok(SessionParams {
        locale: Locale::from_tag(&config.core.locale),
        audience: config
            .chat
            .audience
            .parse::<Audience>()
            .map_err(anyhow::Error::msg)?,
        mode,
        temperature: config.chat.temperature,
        allow_initiative: config.chat.allow_initiative,
        history_window: config.chat.history_window,
        context_max_chars: config.chat.context_max_chars,
        pain_cue_heart_rate: config.signals.pain_cue_heart_rate,
        request_timeout: Duration::from_secs(config.model.request_timeout_secs),
    })
}

/// Run the interactive conversation REPL.
pub async fn handle_chat(
    config: &Config,
    mode_override: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let params = session_params(config, mode_override.as_deref())?;

    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiProvider::from_config(&config.model));
    let store: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(config.memory_path()));

    let (snapshot_tx, snapshot_rx) = watch::channel(SignalSnapshot::default());
    let cancel = CancellationToken::new();
    let feed_handle = tokio::spawn(run_feed(
        build_source(config),
        build_aggregator(config),
        snapshot_tx,
        Duration::from_millis(config.signals.poll_interval_ms),
        cancel.clone(),
    ));

    let mut controller = ChatController::new(params, provider, store, snapshot_rx);

    print_message(&controller.messages()[0], format);
    if matches!(format, OutputFormat::Text) {
        println!("(type /help for commands, /quit to exit)");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if !handle_slash_command(&mut controller, command) {
                break;
            }
            continue;
        }

        match controller.submit(input).await {
            SubmitOutcome::Replied(msg) => print_message(&msg, format),
            SubmitOutcome::Ignored => {}
        }
    }

    cancel.cancel();
    feed_handle.await.ok();
    Ok(())
}

/// Handle one slash command. Returns false when the REPL should exit.
fn handle_slash_command(controller: &mut ChatController, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    let head = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match head {
        "quit" | "exit" => return false,
        "help" => {
            println!(
                "/mode local|delegated  /locale sv|es|en  /temperature 0.0-1.0\n\
                 /initiative on|off  /audience clinician|caregiver|adult|youth\n\
                 /signal overload|noise|hunger|rest on|off  /signals  /memory\n\
                 /memory name <text> | calming|avoid|triggers a,b,c  /quit"
            );
        }
        "mode" => match args.first().map(|s| s.parse::<ResponseMode>()) {
            Some(Ok(mode)) => {
                controller.set_mode(mode);
                println!("mode: {mode}");
            }
            _ => println!("usage: /mode local|delegated"),
        },
        "locale" => match args.first() {
            Some(tag) => {
                controller.set_locale(Locale::from_tag(tag));
                println!("locale: {}", controller.locale());
            }
            None => println!("usage: /locale sv|es|en"),
        },
        "temperature" => match args.first().and_then(|s| s.parse::<f64>().ok()) {
            Some(value) => {
                controller.set_temperature(value);
                println!("temperature: {:.1}", controller.temperature());
            }
            None => println!("usage: /temperature 0.0-1.0"),
        },
        "initiative" => match args.first() {
            Some(&"on") => controller.set_allow_initiative(true),
            Some(&"off") => controller.set_allow_initiative(false),
            _ => println!("usage: /initiative on|off"),
        },
        "audience" => match args.first().map(|s| s.parse::<Audience>()) {
            Some(Ok(audience)) => {
                controller.set_audience(audience);
                println!("audience: {audience}");
            }
            _ => println!("usage: /audience clinician|caregiver|adult|youth"),
        },
        "signal" => match (args.first(), args.get(1)) {
            (Some(name), Some(&state)) if state == "on" || state == "off" => {
                if controller.set_manual_flag(name, state == "on") {
                    println!("signal {name}: {state}");
                } else {
                    println!("unknown signal '{name}' (overload, noise, hunger, rest)");
                }
            }
            _ => println!("usage: /signal overload|noise|hunger|rest on|off"),
        },
        "signals" => {
            let snapshot = controller.effective_snapshot();
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
            );
        }
        "memory" => {
            if args.is_empty() {
                println!(
                    "{}",
                    serde_json::to_string_pretty(controller.memory())
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else if let Err(err) = apply_memory_edit(controller, &args) {
                println!("{err}");
            }
        }
        other => println!("unknown command '/{other}' (try /help)"),
    }
    true
}

fn apply_memory_edit(controller: &mut ChatController, args: &[&str]) -> Result<()> {
    let field = args[0];
    let value = args[1..].join(" ");
    let mut memory = controller.memory().clone();

    match field {
        "name" => {
            memory.preferred_name = if value.is_empty() { None } else { Some(value) };
        }
        "calming" | "avoid" | "triggers" => {
            let words = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            match field {
                "calming" => memory.calming_words = words,
                "avoid" => memory.avoid_words = words,
                _ => memory.known_triggers = words,
            }
        }
        other => anyhow::bail!("unknown memory field '{other}' (name, calming, avoid, triggers)"),
    }

    controller
        .update_memory(memory)
        .context("failed to persist memory")?;
    println!("memory updated");
    Ok(())
}

/// Run the telemetry feed and print one snapshot line per poll.
pub async fn handle_feed(config: &Config, ticks: Option<u64>, format: OutputFormat) -> Result<()> {
    let mut source = build_source(config);
    let mut aggregator = build_aggregator(config);
    let interval = Duration::from_millis(config.signals.poll_interval_ms);

    let mut polled: u64 = 0;
    loop {
        match source.next_frame().await {
            Ok(frame) => {
                let snapshot = aggregator.apply_frame(&frame, Utc::now());
                println!("{}", format_feed_line(&snapshot, format));
            }
            Err(err) => println!("poll failed: {err}"),
        }

        polled += 1;
        if let Some(limit) = ticks {
            if polled >= limit {
                break;
            }
        }
        tokio::time::sleep(interval).await;
    }

    Ok(())
}

/// Run system diagnostics: configuration, credential, provider health and
/// memory store readability.
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<(&str, String)> = Vec::new();
    let mut issues: Vec<String> = Vec::new();

    // Config is already validated when loaded.
    checks.push(("Configuration", "Valid".to_string()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory", "Exists".to_string()));
    } else {
        checks.push(("Data directory", "Missing".to_string()));
        issues.push(format!(
            "Data directory does not exist: {:?}",
            config.core.data_dir
        ));
    }

    if SecretString::from_env(&config.model.api_key_env).is_some() {
        checks.push(("API credential", format!("Present ({})", config.model.api_key_env)));
    } else {
        checks.push(("API credential", "Missing".to_string()));
        issues.push(format!(
            "No credential in ${}; delegated mode will fail, local mode still works",
            config.model.api_key_env
        ));
    }

    let provider = OpenAiProvider::from_config(&config.model);
    let healthy = provider.check_health().await;
    checks.push((
        "Model provider",
        if healthy { "Ready" } else { "Unavailable" }.to_string(),
    ));

    let store = FileMemoryStore::new(config.memory_path());
    let memory = store.load();
    let populated = memory != Memory::default();
    checks.push((
        "Memory store",
        if populated {
            "Readable (record present)"
        } else {
            "Readable (empty)"
        }
        .to_string(),
    ));

    checks.push((
        "Telemetry source",
        match &config.signals.feed_url {
            Some(url) => format!("Polled ({url})"),
            None => "Simulated".to_string(),
        },
    ));

    match format {
        OutputFormat::Json => {
            let report = json!({
                "checks": checks
                    .iter()
                    .map(|(name, state)| json!({ "name": name, "state": state }))
                    .collect::<Vec<_>>(),
                "issues": issues,
                "ok": issues.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("Neuroljus diagnostics:");
            for (name, state) in &checks {
                println!("  {name:<18} {state}");
            }
            if issues.is_empty() {
                println!("\nAll checks passed.");
            } else {
                println!("\nIssues:");
                for issue in &issues {
                    println!("  - {issue}");
                }
            }
        }
    }

    Ok(())
}
