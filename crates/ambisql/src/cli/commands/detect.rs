use std::path::PathBuf;

use anyhow::{Error, Result};
use clap::Args;
use serde_json::json;

use crate::error::ClarifyError;
use crate::models::{ClarifyEnvelope, ClarifyEnvelopeFailure, DetectionResult};
use crate::oracle::LanguageOracle;
use crate::rewriter::Rewriter;

const COMMAND: &str = "detect";

#[derive(Debug, Clone, Args)]
pub struct DetectArgs {
    #[arg(long, value_name = "TEXT")]
    pub question: String,

    #[arg(long, value_name = "PATH")]
    pub schema: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub async fn run(args: &DetectArgs, oracle: &dyn LanguageOracle) -> Result<()> {
    let schema = super::load_schema(&args.schema)?;
    let mut rewriter = Rewriter::new(args.question.as_str(), schema);

    let result = match rewriter.detect(oracle).await {
        Ok(result) => result,
        Err(error) => return Err(command_error(args.json, error)),
    };

    if args.json {
        let envelope = ClarifyEnvelope::ok(COMMAND, serde_json::to_value(&result)?)
            .with_meta("round", json!(rewriter.round()))
            .with_meta("state", json!(rewriter.state()));
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        print!("{}", render_detection_text(&result));
    }

    Ok(())
}

fn command_error(json_output: bool, error: ClarifyError) -> Error {
    if json_output {
        Error::new(ClarifyEnvelopeFailure::from_error(COMMAND, &error))
    } else {
        Error::new(error)
    }
}

/// Human-readable rendering of one detection pass.
#[must_use]
pub fn render_detection_text(result: &DetectionResult) -> String {
    let mut lines = Vec::new();

    match result {
        DetectionResult::Ambiguous { question_set } => {
            lines.push(format!("detect: ambiguous items={}", question_set.len()));
            for (index, item) in question_set.iter().enumerate() {
                lines.push(format!(
                    "[{}] {} ({} / {})",
                    index + 1,
                    item.question,
                    item.level1,
                    item.level2
                ));
                for (choice_index, choice) in item.choices.iter().flatten().enumerate() {
                    lines.push(format!("    {}. {choice}", choice_index + 1));
                }
            }
        }
        DetectionResult::Resolved(handoff) => {
            lines.push("detect: no ambiguity".to_string());
            lines.push(format!("question: {}", handoff.question));
        }
    }

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    rendered
}
