use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::{Value, json};

use crate::models::{answer_set_schema, detection_result_schema, sql_handoff_schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaKind {
    All,
    Detection,
    Answers,
    Handoff,
}

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[arg(long, value_enum, default_value_t = SchemaKind::All)]
    pub kind: SchemaKind,
}

pub fn run(args: &SchemaArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&schema_document(args.kind))?);
    Ok(())
}

/// JSON schemas of the caller-facing payloads.
#[must_use]
pub fn schema_document(kind: SchemaKind) -> Value {
    match kind {
        SchemaKind::All => json!({
            "detection_result": detection_result_schema(),
            "answer_set": answer_set_schema(),
            "sql_handoff": sql_handoff_schema(),
        }),
        SchemaKind::Detection => detection_result_schema(),
        SchemaKind::Answers => answer_set_schema(),
        SchemaKind::Handoff => sql_handoff_schema(),
    }
}
