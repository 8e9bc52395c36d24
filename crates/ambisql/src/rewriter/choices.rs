use tracing::{debug, warn};

use crate::models::AmbiguityItem;
use crate::oracle::LanguageOracle;
use crate::parse::{ChoicesReply, parse_choices_reply};
use crate::prompts;

/// Fills `choices` for every item that has none yet.
///
/// Requests run through the oracle's bounded batch call and are matched back to
/// their item by index. A failed call or an unparseable reply degrades to the
/// question-text fallback and finally to an empty list; it never fails the round.
pub async fn synthesize_choices(
    oracle: &dyn LanguageOracle,
    mut items: Vec<AmbiguityItem>,
) -> Vec<AmbiguityItem> {
    let targets: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.choices.is_none())
        .map(|(index, _)| index)
        .collect();
    if targets.is_empty() {
        return items;
    }

    let requests = targets
        .iter()
        .map(|&index| prompts::clarification_choices(&items[index]))
        .collect();
    let replies = oracle.call_many(requests).await;

    for (&index, reply) in targets.iter().zip(replies) {
        let item = &mut items[index];
        let reply = match reply {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(index, %error, "choice synthesis call failed");
                None
            }
        };

        let choices = match parse_choices_reply(reply.as_deref(), &item.question) {
            ChoicesReply::Options { choices, source } => {
                debug!(index, ?source, count = choices.len(), "choices synthesized");
                choices
            }
            ChoicesReply::FreeText => {
                debug!(index, "no closed-form choices, expecting free text");
                Vec::new()
            }
        };
        item.choices = Some(choices);
    }

    items
}
