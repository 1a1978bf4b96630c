//! `swarmforge onboard` — First-time setup.

use swarmforge_config::AppConfig;
use swarmforge_security::env_var_name;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let memory_path = AppConfig::memory_path();

    println!("🐝 SwarmForge — First-Time Setup");
    println!("================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if let Some(memory_dir) = memory_path.parent() {
        if !memory_dir.exists() {
            std::fs::create_dir_all(memory_dir)?;
            println!("✅ Created memory directory: {}", memory_dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!(
            "   1. Add an API key to {} or export {}",
            config_path.display(),
            env_var_name("openrouter")
        );
        println!("   2. Check keys: swarmforge providers");
        println!("   3. Run: swarmforge run --task \"...\"\n");
    }

    println!("🎉 Setup complete!\n");

    Ok(())
}
