//! `swarmforge agents` — List agents in run order.

use swarmforge_agent::AgentRegistry;

use crate::runtime;

pub async fn run(preset: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = match preset {
        Some(name) => AgentRegistry::preset(&name)
            .ok_or_else(|| format!("Unknown preset '{name}' (expected code, critique or review)"))?,
        None => {
            let config = runtime::load_config()?;
            if config.agents.is_empty() {
                AgentRegistry::code_pipeline()
            } else {
                AgentRegistry::from_definitions(&config.agents)?
            }
        }
    };

    println!("{:<4} {:<16} {:<22} {:<20} {:<14} {}", "#", "Id", "Name", "Role", "Category", "Model");
    for (i, agent) in registry.agents_in_order().iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<22} {:<20} {:<14} {}",
            i,
            agent.id,
            agent.name,
            agent.role.as_str(),
            agent.role.category().as_str(),
            agent.preferred_model.as_deref().unwrap_or("(provider default)")
        );
    }

    let disabled: Vec<&str> = registry
        .all()
        .iter()
        .filter(|a| !a.enabled)
        .map(|a| a.id.as_str())
        .collect();
    if !disabled.is_empty() {
        println!("\nDisabled: {}", disabled.join(", "));
    }

    Ok(())
}
