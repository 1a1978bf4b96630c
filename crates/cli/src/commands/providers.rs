//! `swarmforge providers` — Show configured providers and credential status.

use swarmforge_security::env_var_name;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let gateway = runtime::build_gateway(&config, None);

    println!("🤖 Providers");
    println!("============");
    println!("  Fallback order: {}", config.provider_order.join(" → "));
    println!();
    println!("  {:<14} {:<10} {:<11} {:<8} {}", "Provider", "Key", "Embeddings", "Timeout", "Env var");
    for status in gateway.providers().await {
        println!(
            "  {:<14} {:<10} {:<11} {:<8} {}",
            status.id,
            if status.has_credential { "✅ set" } else { "— missing" },
            if status.embeddings { "yes" } else { "no" },
            format!("{}s", status.timeout_secs),
            env_var_name(&status.id)
        );
    }

    println!();
    println!("  Providers without a key are skipped without a network call.");
    println!("  Set keys in [providers.<id>] api_key or the env var shown.");

    Ok(())
}
