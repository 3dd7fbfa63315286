//! `oasis onboard` — initialize configuration and data directories.

use anyhow::Result;
use colored::Colorize;

use oasis_core::config::{load_config, save_config};
use oasis_core::utils::{get_data_path, get_default_workspace_path};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "Oasis — Setup".cyan().bold());
    println!();

    let data_dir = get_data_path();
    let config_path = data_dir.join("config.json");

    // 1. Create config if it doesn't exist
    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        let config = load_config(None); // defaults + env
        save_config(&config, Some(&config_path))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    // 2. Workspace and history directories
    let workspace = get_default_workspace_path();
    std::fs::create_dir_all(&workspace)?;
    println!("  {} workspace at {}", "✓".green(), workspace.display());

    let history_dir = data_dir.join("history");
    std::fs::create_dir_all(&history_dir)?;

    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Put your API keys in {}", config_path.display());
    println!("     (llm.api_key, embedding.api_key — or OASIS_LLM__API_KEY etc.)");
    println!("  2. Run {} to talk to the assistant", "oasis agent".cyan());
    println!("  3. Run {} for the full runtime", "oasis run".cyan());
    println!();
    Ok(())
}
