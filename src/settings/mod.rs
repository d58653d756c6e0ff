//! Settings come from a TOML file layered with environment variables.
//! Secrets are wrapped in `Secret` so that `Debug` output stays safe to log.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
