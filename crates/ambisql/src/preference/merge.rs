use tracing::{debug, warn};

use crate::error::{ClarifyError, ClarifyResult};
use crate::models::QaFact;
use crate::oracle::LanguageOracle;
use crate::parse::{ReplyKind, parse_merge_reply};
use crate::prompts;
use crate::utils::content::excerpt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    Replaced { index: usize },
}

impl MergeOutcome {
    #[must_use]
    pub fn apply(self, existing: &[QaFact], new_fact: QaFact) -> Vec<QaFact> {
        let mut merged = existing.to_vec();
        match self {
            Self::Appended => merged.push(new_fact),
            Self::Replaced { index } => merged[index] = new_fact,
        }
        merged
    }
}

/// Folds `new_fact` into a non-empty leaf list using the oracle's same-intent judgement.
///
/// The oracle proposes a merged list; the outcome is derived from which existing
/// facts survived and then applied locally, so the result always holds the new
/// fact exactly once and keeps every other fact in place.
pub async fn semantic_merge(
    oracle: &dyn LanguageOracle,
    existing: &[QaFact],
    new_fact: QaFact,
) -> ClarifyResult<Vec<QaFact>> {
    let messages = prompts::node_merge(existing, &new_fact);
    let reply = oracle.call(&messages).await?;
    debug!(reply = %excerpt(&reply), "merge reply received");

    let proposed = parse_merge_reply(&reply)?;
    let outcome = reconcile_merge(existing, &new_fact, &proposed.facts)
        .map_err(|reason| ClarifyError::malformed(ReplyKind::Merge, reason))?;
    debug!(?outcome, existing = existing.len(), "merge reconciled");

    Ok(outcome.apply(existing, new_fact))
}

/// Works out whether the proposed list appended `new_fact` or replaced exactly one fact.
pub fn reconcile_merge(
    existing: &[QaFact],
    new_fact: &QaFact,
    proposed: &[QaFact],
) -> Result<MergeOutcome, String> {
    if !proposed.iter().any(|fact| same_fact(fact, new_fact)) {
        return Err("merged list dropped the new fact".to_string());
    }

    let missing: Vec<usize> = existing
        .iter()
        .enumerate()
        .filter(|(_, old)| {
            !proposed
                .iter()
                .any(|fact| same_fact(fact, old) && !same_fact(fact, new_fact))
                && !same_fact(old, new_fact)
        })
        .map(|(index, _)| index)
        .collect();

    let exact_match = existing
        .iter()
        .position(|old| same_question(&old.question, &new_fact.question));

    match (missing.as_slice(), exact_match) {
        ([], None) => Ok(MergeOutcome::Appended),
        ([], Some(index)) => {
            if same_fact(&existing[index], new_fact) {
                debug!(index, "merge re-applied an identical fact");
            } else {
                warn!(index, "merge kept an identical question, replacing it instead");
            }
            Ok(MergeOutcome::Replaced { index })
        }
        ([index], None) => Ok(MergeOutcome::Replaced { index: *index }),
        ([index], Some(exact)) if *index == exact => Ok(MergeOutcome::Replaced { index: exact }),
        ([index], Some(exact)) => Err(format!(
            "merged list replaced fact {index} but fact {exact} asks the identical question"
        )),
        (indices, _) => Err(format!(
            "merged list removed {} existing facts, at most one may be replaced",
            indices.len()
        )),
    }
}

fn same_fact(left: &QaFact, right: &QaFact) -> bool {
    same_question(&left.question, &right.question) && left.answer.trim() == right.answer.trim()
}

fn same_question(left: &str, right: &str) -> bool {
    left.trim() == right.trim()
}
