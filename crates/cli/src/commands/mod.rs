pub mod ask;
pub mod chat;
pub mod init;
pub mod reset;

use asklab_config::AppConfig;

/// Options shared by the research commands.
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Who is asking; scopes long-term memory
    #[arg(short, long, default_value = "local_user", env = "ASKLAB_USER")]
    pub user: String,

    /// Hide progress notices
    #[arg(short, long)]
    pub quiet: bool,
}

/// Load the config and make sure a model can be reached.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early; give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export GROQ_API_KEY='gsk_...'      (recommended)");
        eprintln!("    export ASKLAB_API_KEY='...'        (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}
