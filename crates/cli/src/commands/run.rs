//! `swarmforge run` — Run an agent swarm on a task.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use swarmforge_agent::{AgentRegistry, SwarmOutcome};
use swarmforge_core::sink::PersistenceSink;
use swarmforge_core::swarm::SwarmRequest;
use swarmforge_telemetry::MetricsCollector;
use tokio_util::sync::CancellationToken;

use crate::run_log::{self, RunLogSink};
use crate::runtime;

#[derive(Args)]
pub struct RunArgs {
    /// What the swarm should produce
    #[arg(short, long)]
    pub task: String,

    /// Files to include as context (repeatable)
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Comma-separated provider fallback order (overrides config)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Critique→refine iterations; more than 1 enables the convergence loop
    #[arg(short, long, default_value_t = 1)]
    pub iterations: u32,

    /// Built-in pipeline to use instead of the configured agents (code, critique)
    #[arg(long)]
    pub preset: Option<String>,

    /// User id for rate limiting
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Print the full outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = runtime::load_config()?;
    runtime::apply_provider_override(&mut config, args.provider.as_deref());

    let mut request = SwarmRequest::new(args.task.clone(), config.provider_order.clone()).with_iterations(args.iterations);
    for path in &args.files {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        request = request.with_file(content);
    }

    let mut rt = runtime::build(config)?;
    if let Some(name) = &args.preset {
        let registry = AgentRegistry::preset(name)
            .filter(|_| name != "review")
            .ok_or_else(|| format!("Unknown pipeline preset '{name}' (expected code or critique)"))?;
        rt.engine = rt.engine.with_registry(registry);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling after the current agent step...");
            on_interrupt.cancel();
        }
    });

    let outcome = rt.engine.execute(&args.user, request, &cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
        if let Some(metrics) = &rt.metrics {
            print_metrics(metrics);
        }
    }

    let sink: Arc<dyn PersistenceSink> = Arc::new(RunLogSink::new(RunLogSink::default_path()));
    let completed = outcome.run.is_completed();
    // The result is already printed; a failed write only logs.
    run_log::persist(sink, outcome.run).await;

    if completed {
        Ok(())
    } else {
        Err("swarm run did not complete".into())
    }
}

fn print_outcome(outcome: &SwarmOutcome) {
    let run = &outcome.run;
    println!();
    println!("  Run:        {}", run.id);
    println!("  Status:     {}", run.status);
    if let Some(reason) = run.failure_reason {
        println!("  Reason:     {reason:?}");
    }
    println!("  Provider:   {}", run.provider_used.as_deref().unwrap_or("-"));
    println!("  Iterations: {}", run.iteration_count);
    if let Some(decision) = outcome.gate_decision {
        println!("  Gate:       {decision}");
    }
    if let Some(failure) = &outcome.convergence_failure {
        println!("  Stopped:    {failure}");
    }

    println!();
    println!("  Trace:");
    for message in &run.messages {
        let mark = if message.is_error { "✗" } else { "✓" };
        println!(
            "    {mark} #{:<2} {:<12} {}",
            message.ordinal,
            message.agent_id,
            message.provider.as_deref().unwrap_or("")
        );
    }

    if !outcome.history.is_empty() {
        println!();
        println!("  Convergence:");
        for report in &outcome.history {
            println!(
                "    iteration {}: score {:.0} ({} issues) → {}",
                report.iteration,
                report.score_after,
                report.issues.len(),
                report.decision
            );
        }
    }

    println!();
    println!("{}", run.final_output);
}

fn print_metrics(metrics: &MetricsCollector) {
    let snapshot = metrics.snapshot();
    if snapshot.is_empty() {
        return;
    }
    println!();
    println!("  Provider latency:");
    for stats in &snapshot.providers {
        println!(
            "    {:<12} calls {:>3}  failures {:>3}  p50 {:>6}ms  p95 {:>6}ms",
            stats.provider, stats.total_calls, stats.total_failures, stats.p50_latency_ms, stats.p95_latency_ms
        );
    }
}
