use clap::{Args, Parser, Subcommand};

use super::commands::{clarify::ClarifyArgs, detect::DetectArgs, schema::SchemaArgs};
use crate::config::OracleOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "ambisql",
    version,
    about = "Multi-round question clarification before text-to-SQL"
)]
pub struct Cli {
    #[command(flatten)]
    pub oracle: OracleArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct OracleArgs {
    #[arg(long, global = true, value_name = "URL")]
    pub oracle_url: Option<String>,

    #[arg(long, global = true, value_name = "NAME")]
    pub model: Option<String>,

    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    #[arg(long, global = true, value_name = "N")]
    pub max_concurrency: Option<usize>,
}

impl OracleArgs {
    #[must_use]
    pub fn overrides(&self) -> OracleOverrides {
        OracleOverrides {
            endpoint: self.oracle_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            max_concurrency: self.max_concurrency,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Detect(DetectArgs),
    Clarify(ClarifyArgs),
    Schema(SchemaArgs),
}
