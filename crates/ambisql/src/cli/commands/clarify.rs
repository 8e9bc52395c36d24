use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::json;

use crate::models::{AmbiguityItem, ClarifyEnvelope, DetectionResult, QaAnswer, SqlHandoff};
use crate::oracle::LanguageOracle;
use crate::rewriter::Rewriter;
use crate::sqlgen::{DEFAULT_DIALECT, OracleSqlGenerator};

const COMMAND: &str = "clarify";

#[derive(Debug, Clone, Args)]
pub struct ClarifyArgs {
    #[arg(long, value_name = "TEXT")]
    pub question: String,

    #[arg(long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Generate SQL for the original and the clarified question.
    #[arg(long, default_value_t = false)]
    pub sql: bool,

    #[arg(long, default_value = DEFAULT_DIALECT)]
    pub dialect: String,

    /// Upper bound on detection rounds; later rounds reuse the collected answers as evidence.
    #[arg(long, default_value_t = 1)]
    pub max_rounds: u32,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub async fn run(args: &ClarifyArgs, oracle: Arc<dyn LanguageOracle>) -> Result<()> {
    if args.max_rounds == 0 {
        bail!("--max-rounds must be greater than zero");
    }
    let schema = super::load_schema(&args.schema)?;
    let mut rewriter = Rewriter::new(args.question.as_str(), schema.as_str());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    let handoff = clarify_interactively(
        &mut rewriter,
        oracle.as_ref(),
        args.max_rounds,
        &mut input,
        &mut output,
    )
    .await?;

    let sql = if args.sql {
        let generator = OracleSqlGenerator::new(oracle, args.dialect.as_str());
        Some(
            generator
                .generate_pair(&schema, rewriter.original_question(), &handoff)
                .await?,
        )
    } else {
        None
    };

    if args.json {
        let envelope = ClarifyEnvelope::ok(
            COMMAND,
            json!({
                "original_question": rewriter.original_question(),
                "question": handoff.question,
                "evidence": handoff.evidence,
                "sql": sql,
            }),
        )
        .with_meta("rounds", json!(rewriter.round()))
        .with_meta("facts", json!(rewriter.preference_tree().fact_count()));
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    println!("clarify: resolved rounds={}", rewriter.round());
    println!("question: {}", handoff.question);
    println!("evidence:\n{}", handoff.evidence);
    if let Some(sql) = sql {
        println!("sql (original question):\n{}", sql.raw);
        println!("sql (clarified question):\n{}", sql.clarified);
    }

    Ok(())
}

/// Drives the clarification loop over a line-oriented prompt.
///
/// Every pending item is shown with numbered choices; the user answers with a
/// choice number or free text, and a blank line skips the item.
pub async fn clarify_interactively<R, W>(
    rewriter: &mut Rewriter,
    oracle: &dyn LanguageOracle,
    max_rounds: u32,
    input: &mut R,
    output: &mut W,
) -> Result<SqlHandoff>
where
    R: BufRead,
    W: Write,
{
    let mut result = rewriter.detect(oracle).await?;

    loop {
        let question_set = match result {
            DetectionResult::Resolved(handoff) => return Ok(handoff),
            DetectionResult::Ambiguous { question_set } => question_set,
        };

        writeln!(
            output,
            "clarify: round {} found {} ambiguous item(s)",
            rewriter.round(),
            question_set.len()
        )?;
        let answers = collect_answers(&question_set, input, output)?;
        let additional_info =
            prompt_line(input, output, "Additional information (optional): ")?;

        let resolved = rewriter
            .correct(oracle, &answers, &additional_info)
            .await?;
        if rewriter.round() >= max_rounds {
            return match resolved {
                DetectionResult::Resolved(handoff) => Ok(handoff),
                DetectionResult::Ambiguous { .. } => Ok(rewriter.handoff()),
            };
        }

        result = rewriter.follow_up(oracle).await?;
    }
}

fn collect_answers<R, W>(
    question_set: &[AmbiguityItem],
    input: &mut R,
    output: &mut W,
) -> Result<Vec<QaAnswer>>
where
    R: BufRead,
    W: Write,
{
    let mut answers = Vec::new();

    for (index, item) in question_set.iter().enumerate() {
        writeln!(output, "[{}/{}] {}", index + 1, question_set.len(), item.question)?;
        writeln!(output, "  ({} / {})", item.level1, item.level2)?;
        for (choice_index, choice) in item.choices.iter().flatten().enumerate() {
            writeln!(output, "  {}. {choice}", choice_index + 1)?;
        }

        let prompt = if item.expects_free_text() {
            "Answer: "
        } else {
            "Answer (number or free text): "
        };
        let line = prompt_line(input, output, prompt)?;
        if let Some(answer) = answer_from_input(item, &line) {
            answers.push(item.answered(answer));
        }
    }

    Ok(answers)
}

/// Maps one input line to an answer: a valid choice number picks that choice,
/// anything else non-blank is taken verbatim.
#[must_use]
pub fn answer_from_input(item: &AmbiguityItem, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let choices = item.choices.as_deref().unwrap_or_default();
    if let Ok(number) = trimmed.parse::<usize>()
        && (1..=choices.len()).contains(&number)
    {
        return Some(choices[number - 1].clone());
    }

    Some(trimmed.to_string())
}

fn prompt_line<R, W>(input: &mut R, output: &mut W, prompt: &str) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read answer from stdin")?;
    Ok(line.trim().to_string())
}
