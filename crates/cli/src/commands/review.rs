//! `swarmforge review` — Score a file with the specialist panel.

use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::runtime;

#[derive(Args)]
pub struct ReviewArgs {
    /// File to review
    #[arg(short, long)]
    pub file: PathBuf,

    /// User id for rate limiting
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Print the full outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ReviewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let artifact = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("Failed to read {}: {e}", args.file.display()))?;

    let rt = runtime::build(runtime::load_config()?)?;
    let outcome = rt
        .engine
        .review(&args.user, &artifact, &CancellationToken::new())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let aggregate = &outcome.aggregate;
    println!();
    println!("  Review of {}", args.file.display());
    println!("  Overall score: {:.1}", aggregate.overall_score);
    for (category, score) in &aggregate.category_scores {
        println!("    {:<14} {score:.1}", category.as_str());
    }

    if !outcome.failed_agents.is_empty() {
        println!("  No score from: {}", outcome.failed_agents.join(", "));
    }

    println!();
    if aggregate.issues.is_empty() {
        println!("  No issues reported.");
    } else {
        println!("  Issues:");
        for issue in &aggregate.issues {
            println!("    [{:<8}] {:<12} {}", issue.severity.as_str(), issue.category.as_str(), issue.message);
        }
    }

    Ok(())
}
