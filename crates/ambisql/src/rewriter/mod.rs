//! Clarification round controller.
//!
//! A [`Rewriter`] owns one conversation: the current question, the schema blob,
//! the preference tree and the question set awaiting answers. It moves through
//! `INIT -> AWAITING_ANSWERS -> RESOLVED`; [`Rewriter::reopen`] starts a
//! follow-up round that feeds the accumulated evidence back into detection.

pub mod choices;

use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ClarifyError, ClarifyResult};
use crate::models::{AmbiguityItem, DetectionResult, QaAnswer, SqlHandoff};
use crate::oracle::LanguageOracle;
use crate::parse::{DetectionReply, parse_detection_reply, parse_refinement_reply};
use crate::preference::PreferenceTree;
use crate::prompts;
use crate::utils::content::{excerpt, non_empty_text};

pub use choices::synthesize_choices;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    Init,
    AwaitingAnswers,
    Resolved,
}

impl RoundState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::AwaitingAnswers => "AWAITING_ANSWERS",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl Display for RoundState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Rewriter {
    original_question: String,
    current_question: String,
    schema: String,
    tree: PreferenceTree,
    pending: Option<Vec<AmbiguityItem>>,
    state: RoundState,
    round: u32,
}

impl Rewriter {
    #[must_use]
    pub fn new(question: impl Into<String>, schema: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            original_question: question.clone(),
            current_question: question,
            schema: schema.into(),
            tree: PreferenceTree::new(),
            pending: None,
            state: RoundState::Init,
            round: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> RoundState {
        self.state
    }

    /// Number of detection passes that completed so far.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub fn original_question(&self) -> &str {
        &self.original_question
    }

    #[must_use]
    pub fn current_question(&self) -> &str {
        &self.current_question
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    #[must_use]
    pub fn preference_tree(&self) -> &PreferenceTree {
        &self.tree
    }

    #[must_use]
    pub fn pending_question_set(&self) -> Option<&[AmbiguityItem]> {
        self.pending.as_deref()
    }

    #[must_use]
    pub fn evidence(&self) -> String {
        self.tree.render_evidence()
    }

    #[must_use]
    pub fn handoff(&self) -> SqlHandoff {
        SqlHandoff {
            question: self.current_question.clone(),
            evidence: self.evidence(),
        }
    }

    /// Runs ambiguity detection for the current question.
    ///
    /// Valid only in `INIT`. Nothing is mutated unless the oracle reply parses.
    pub async fn detect(&mut self, oracle: &dyn LanguageOracle) -> ClarifyResult<DetectionResult> {
        self.require(RoundState::Init, "detect")?;
        self.run_detection(oracle).await
    }

    /// Reopens a resolved conversation and detects again with the accumulated evidence.
    ///
    /// Equivalent to [`Rewriter::reopen`] followed by [`Rewriter::detect`], except that
    /// a failed detection leaves the conversation `RESOLVED`.
    pub async fn follow_up(
        &mut self,
        oracle: &dyn LanguageOracle,
    ) -> ClarifyResult<DetectionResult> {
        self.require(RoundState::Resolved, "follow_up")?;
        self.run_detection(oracle).await
    }

    async fn run_detection(&mut self, oracle: &dyn LanguageOracle) -> ClarifyResult<DetectionResult> {
        let evidence = if self.tree.is_empty() {
            String::new()
        } else {
            self.tree.render_evidence()
        };
        let messages =
            prompts::ambiguity_detection(&self.current_question, &self.schema, &evidence);
        let reply = oracle.call(&messages).await?;
        debug!(reply = %excerpt(&reply), "detection reply received");

        let round = self.round + 1;
        match parse_detection_reply(&reply)? {
            DetectionReply::Clear => {
                self.round = round;
                self.pending = None;
                self.state = RoundState::Resolved;
                info!(round, state = %self.state, "no ambiguity detected");
                Ok(DetectionResult::Resolved(self.handoff()))
            }
            DetectionReply::Ambiguous(items) => {
                let question_set = synthesize_choices(oracle, items).await;
                self.round = round;
                self.pending = Some(question_set.clone());
                self.state = RoundState::AwaitingAnswers;
                info!(
                    round,
                    items = question_set.len(),
                    state = %self.state,
                    "ambiguity detected"
                );
                Ok(DetectionResult::Ambiguous { question_set })
            }
        }
    }

    /// Folds the user's answers into the tree and finalizes the round.
    ///
    /// Non-empty `additional_info` refines the question and finalizes without
    /// another detection pass. All oracle work runs against staged copies, so a
    /// failure leaves the tree, the question and the state untouched.
    pub async fn correct(
        &mut self,
        oracle: &dyn LanguageOracle,
        answers: &[QaAnswer],
        additional_info: &str,
    ) -> ClarifyResult<DetectionResult> {
        self.require(RoundState::AwaitingAnswers, "correct")?;

        let mut staged = self.tree.clone();
        for answer in answers {
            staged
                .add_fact(oracle, &answer.level1, &answer.level2, answer.fact())
                .await?;
        }

        let question = match non_empty_text(additional_info) {
            Some(info) => refine_question(oracle, &self.current_question, &info).await?,
            None => self.current_question.clone(),
        };

        self.tree = staged;
        self.current_question = question;
        self.pending = None;
        self.state = RoundState::Resolved;
        info!(
            round = self.round,
            answers = answers.len(),
            facts = self.tree.fact_count(),
            state = %self.state,
            "answers folded into preference tree"
        );

        Ok(DetectionResult::Resolved(self.handoff()))
    }

    /// Starts a follow-up round from `RESOLVED`, keeping the tree and the refined question.
    pub fn reopen(&mut self) -> ClarifyResult<()> {
        self.require(RoundState::Resolved, "reopen")?;
        self.state = RoundState::Init;
        info!(round = self.round, "conversation reopened for another round");
        Ok(())
    }

    fn require(&self, expected: RoundState, operation: &'static str) -> ClarifyResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClarifyError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }
}

/// Merges free-text context into the question; new information wins only on direct conflict.
pub async fn refine_question(
    oracle: &dyn LanguageOracle,
    question: &str,
    additional_info: &str,
) -> ClarifyResult<String> {
    let messages = prompts::question_refine(question, additional_info);
    let reply = oracle.call(&messages).await?;
    let refined = parse_refinement_reply(&reply)?;
    debug!(question = %excerpt(&refined.question), "question refined");
    Ok(refined.question)
}
