use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "JWT access/refresh token service")]
pub struct Cli {
    /// Path to the settings file (defaults to settings/dev.toml or settings/release.toml).
    #[arg(long)]
    pub settings: Option<String>,
}
