#![forbid(unsafe_code)]

use std::sync::Arc;

use ambisql::cli::app::{Cli, Command, OracleArgs};
use ambisql::cli::commands;
use ambisql::config::resolve_oracle_config;
use ambisql::error::ClarifyError;
use ambisql::models::ClarifyEnvelopeFailure;
use ambisql::oracle::ChatCompletionsOracle;
use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_MALFORMED_REPLY: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = command_name(&cli.command);
    println!("ambisql: starting `{command_name}`");

    match execute(cli).await {
        Ok(()) => {
            println!("ambisql: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("ambisql: failed `{command_name}` (exit_code={exit_code})");
            if error.downcast_ref::<ClarifyEnvelopeFailure>().is_some() {
                println!("{error}");
            } else {
                eprintln!("{error:#}");
            }
            exit_code
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Detect(args) => {
            let oracle = build_oracle(&cli.oracle)?;
            let outcome = commands::detect::run(args, oracle.as_ref()).await;
            log_usage(&oracle);
            outcome
        }
        Command::Clarify(args) => {
            let oracle = build_oracle(&cli.oracle)?;
            let outcome = commands::clarify::run(args, oracle.clone()).await;
            log_usage(&oracle);
            outcome
        }
        Command::Schema(args) => commands::schema::run(args),
    }
}

fn build_oracle(args: &OracleArgs) -> Result<Arc<ChatCompletionsOracle>> {
    let config = resolve_oracle_config(&args.overrides(), |key| std::env::var(key).ok())?;
    info!(?config, "oracle configured");
    Ok(Arc::new(ChatCompletionsOracle::from_config(&config)?))
}

fn log_usage(oracle: &ChatCompletionsOracle) {
    let usage = oracle.usage();
    info!(
        model = oracle.model(),
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "oracle token usage"
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<ClarifyEnvelopeFailure>() {
        return if failure.is_malformed_reply() {
            EXIT_MALFORMED_REPLY
        } else {
            EXIT_RUNTIME_FAILURE
        };
    }

    match error.downcast_ref::<ClarifyError>() {
        Some(ClarifyError::MalformedOracleReply { .. }) => EXIT_MALFORMED_REPLY,
        _ => EXIT_RUNTIME_FAILURE,
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Detect(_) => "detect",
        Command::Clarify(_) => "clarify",
        Command::Schema(_) => "schema",
    }
}
