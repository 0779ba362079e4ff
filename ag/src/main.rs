//! ag - aggregation engine CLI
//!
//! Replays delivery scenarios through the engine, either sequentially or
//! with one producer task per delivery.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use aggregator::cli::{Cli, Command, OutputFormat};
use aggregator::config::Config;
use aggregator::scenario::{Delivery, Scenario, Stream};
use aggregator::{
    Aggregator, AggregatorMetrics, AggregatorService, LatestValue, RecordingSink, Sink, Submission,
};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aggregator")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let log_file = fs::File::create(log_dir.join("aggregator.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(?level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    match cli.command {
        Command::Run {
            scenario,
            concurrent,
            format,
        } => cmd_run(&config, &scenario, concurrent, format).await,
        Command::Check { scenario, format } => cmd_check(&scenario, format),
    }
}

/// Replay a scenario, printing each published value as the sink receives it
async fn cmd_run(config: &Config, path: &Path, concurrent: bool, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let policy = scenario.publish_policy.unwrap_or(config.aggregator.publish_policy);
    info!(path = %path.display(), concurrent, ?policy, "cmd_run: replaying scenario");

    let channel = Arc::new(LatestValue::<i64>::new());
    let published = Arc::new(RecordingSink::new());
    let _printer = {
        let published = Arc::clone(&published);
        channel.observe(move |value: &i64| {
            if format == OutputFormat::Text {
                println!("{} {}", "published".green().bold(), value);
            }
            published.publish(*value);
        })
    };

    let metrics = if concurrent {
        run_concurrent(config, &scenario, policy, Arc::clone(&channel)).await?
    } else {
        run_sequential(&scenario, policy, Arc::clone(&channel), format)?
    };

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "published": published.values(),
                "latest": channel.get(),
                "metrics": metrics,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            match channel.get() {
                Some(latest) => println!("{} {}", "latest".bold(), latest),
                None => println!("{}", "nothing published".yellow()),
            }
            println!(
                "{} submissions, {} ignored, {} merges, {} publishes, {} suppressed",
                metrics.submissions, metrics.ignored, metrics.merges, metrics.publishes, metrics.suppressed
            );
        }
    }

    Ok(())
}

fn run_sequential(
    scenario: &Scenario,
    policy: aggregator::PublishPolicy,
    channel: Arc<LatestValue<i64>>,
    format: OutputFormat,
) -> Result<AggregatorMetrics> {
    let agg = Aggregator::with_policy(scenario.rules(), channel, policy);

    for (index, Delivery { tag, value }) in scenario.deliveries.iter().enumerate() {
        let outcome = agg
            .submit(*tag, *value)
            .context(format!("Delivery #{} ({}) failed", index + 1, stream_name(*tag)))?;
        debug!(index, ?outcome, "run_sequential: delivery applied");
        if format == OutputFormat::Text {
            println!("{}", describe(index, *tag, *value, outcome).dimmed());
        }
    }

    Ok(agg.metrics())
}

async fn run_concurrent(
    config: &Config,
    scenario: &Scenario,
    policy: aggregator::PublishPolicy,
    channel: Arc<LatestValue<i64>>,
) -> Result<AggregatorMetrics> {
    let mut service_config = config.aggregator.clone();
    service_config.publish_policy = policy;

    let service = AggregatorService::new(scenario.rules(), channel, service_config);
    let handle = service.handle();
    let task = tokio::spawn(service.run());

    let mut producers = Vec::with_capacity(scenario.deliveries.len());
    for (index, delivery) in scenario.deliveries.iter().cloned().enumerate() {
        let handle = handle.clone();
        producers.push(tokio::spawn(async move {
            let result = handle.submit(delivery.tag, delivery.value).await;
            (index, delivery.tag, result)
        }));
    }

    for producer in producers {
        let (index, tag, result) = producer.await.context("Producer task panicked")?;
        result.context(format!("Delivery #{} ({}) failed", index + 1, stream_name(tag)))?;
    }

    let metrics = handle.metrics().await?;
    handle.shutdown().await?;
    task.await.context("Aggregator service task failed")?;
    Ok(metrics)
}

fn cmd_check(path: &Path, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let summary = scenario.summary();
    info!(path = %path.display(), ?summary, "cmd_check: scenario loaded");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("{} {}", "ok".green().bold(), path.display());
            println!("{} deliveries ({} absent)", summary.deliveries, summary.absent);
            for tag in &summary.never_delivered {
                println!(
                    "{} {} never delivers a value; this scenario never publishes",
                    "warning:".yellow().bold(),
                    stream_name(*tag)
                );
            }
        }
    }

    Ok(())
}

fn stream_name(tag: Stream) -> &'static str {
    match tag {
        Stream::Local => "local",
        Stream::Remote => "remote",
    }
}

fn describe(index: usize, tag: Stream, value: Option<i64>, outcome: Submission) -> String {
    let value = value.map_or_else(|| "absent".to_string(), |v| v.to_string());
    let what = match outcome {
        Submission::Ignored => "ignored",
        Submission::Held { merged: true } => "merged, waiting",
        Submission::Held { merged: false } => "held, waiting",
        Submission::Published { .. } => "complete",
        Submission::Suppressed { .. } => "complete, publish suppressed",
    };
    format!("#{} {} {} -> {}", index + 1, stream_name(tag), value, what)
}
