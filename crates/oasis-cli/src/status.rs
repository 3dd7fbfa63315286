//! `oasis status` — configuration summary.

use anyhow::Result;
use colored::Colorize;

use oasis_core::config::load_config;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);

    println!();
    println!("{}", "Oasis — Status".cyan().bold());
    println!();

    println!("{}", "Chat model".bold());
    println!("  provider: {}", config.llm.provider);
    println!("  model:    {}", config.llm.model);
    println!("  api key:  {}", key_status(&config.llm.api_key));

    let action = config.resolved_action();
    println!("{}", "Action model".bold());
    println!("  provider: {}", action.provider);
    println!("  model:    {}", action.model);

    let intent = config.resolved_intent();
    println!("{}", "Intent model".bold());
    println!("  model:    {}", intent.model);

    println!("{}", "Embeddings".bold());
    println!("  provider:   {}", config.embedding.provider);
    println!("  model:      {}", config.embedding.model);
    println!("  dimensions: {}", config.embedding.dimensions);
    println!("  api key:    {}", key_status(&config.embedding.api_key));

    let db_path = config.database.resolved_path();
    println!("{}", "Database".bold());
    println!("  path:   {}", db_path.display());
    println!(
        "  exists: {}",
        if db_path.exists() { "yes".green() } else { "no".yellow() }
    );

    println!("{}", "Search".bold());
    println!(
        "  brave key: {}",
        key_status(&config.search.brave_api_key)
    );

    println!("{}", "Observer".bold());
    println!(
        "  enabled: {} (input ${}/M, output ${}/M)",
        config.observer.enabled, config.observer.pricing.input, config.observer.pricing.output
    );
    println!();
    Ok(())
}

fn key_status(key: &str) -> colored::ColoredString {
    if key.is_empty() {
        "not set".yellow()
    } else {
        "set".green()
    }
}
