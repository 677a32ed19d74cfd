//! `forgeloop config`: show where configuration lives and what it defaults to.

use forgeloop_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_dir().join("config.toml");
    println!("# Config file: {}", path.display());

    match AppConfig::load() {
        Ok(config) => {
            println!("# Provider:    {}", config.provider.kind);
            println!("# Model:       {}", config.provider.model_or_default());
            println!(
                "# API key:     {}",
                if config.provider.has_api_key() { "set" } else { "missing" }
            );
        }
        Err(e) => println!("# Config error: {e}"),
    }

    println!();
    print!("{}", AppConfig::default_toml());
    Ok(())
}
