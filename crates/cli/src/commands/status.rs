//! `swarmforge status` — Show system status.

use swarmforge_config::AppConfig;
use swarmforge_core::memory::MemoryStore;

use crate::run_log::RunLogSink;
use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;

    println!("🐝 SwarmForge Status");
    println!("====================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Providers:    {}", config.provider_order.join(" → "));
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!(
        "  Agents:       {}",
        if config.agents.is_empty() {
            "built-in code pipeline".to_string()
        } else {
            format!("{} configured", config.agents.len())
        }
    );
    println!(
        "  Rate limit:   {} burst, {}/s refill",
        config.rate_limit.capacity, config.rate_limit.refill_per_second
    );
    println!(
        "  Convergence:  threshold {}, up to {} iterations{}",
        config.convergence.threshold,
        config.convergence.max_iterations,
        config
            .convergence
            .hard_floor
            .map(|f| format!(", hard floor {f}"))
            .unwrap_or_default()
    );
    println!(
        "  Telemetry:    {}",
        if config.telemetry.enabled { "enabled" } else { "disabled" }
    );

    match runtime::open_store(&config)? {
        Some((store, _)) => {
            let count = store.count().await.map_err(|e| format!("Failed to read memory: {e}"))?;
            println!("  Memory:       {} ({count} entries)", config.memory.backend);
        }
        None => println!("  Memory:       disabled"),
    }

    let run_log = RunLogSink::default_path();
    if run_log.exists() {
        println!("  Run log:      {}", run_log.display());
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `swarmforge onboard` first");
    }

    Ok(())
}
