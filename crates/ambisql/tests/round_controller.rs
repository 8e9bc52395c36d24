mod support;

use ambisql::error::ClarifyError;
use ambisql::models::{DetectionResult, QaAnswer};
use ambisql::oracle::OracleError;
use ambisql::parse::ReplyKind;
use ambisql::rewriter::{Rewriter, RoundState};

use support::{
    ScriptedOracle, TEMPORAL_SCOPE, VIETNAM_QUESTION, choices_reply, detection_reply,
    drivers_schema, ranking_item, vietnam_item,
};

const END_YEAR: &str = "End Year: 1975";

fn vietnam_oracle(extra: &[&str]) -> ScriptedOracle {
    let mut replies = vec![
        detection_reply(&[vietnam_item()]),
        choices_reply(&["End Day: April 30, 1975.", "End Year: Dec 31, 1975."]),
    ];
    replies.extend(extra.iter().map(|reply| (*reply).to_string()));
    ScriptedOracle::new(replies)
}

fn answer_for(rewriter: &Rewriter, answer: &str) -> Vec<QaAnswer> {
    rewriter
        .pending_question_set()
        .expect("question set should be pending")
        .iter()
        .map(|item| item.answered(answer))
        .collect()
}

#[tokio::test]
async fn vietnam_question_reports_one_llm_ambiguity() {
    let oracle = vietnam_oracle(&[]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());

    let result = rewriter.detect(&oracle).await.expect("detection should succeed");

    let question_set = result.question_set().expect("result should be ambiguous");
    assert_eq!(question_set.len(), 1);
    assert_eq!(question_set[0].level1, "LLM-related ambiguity");
    assert_eq!(
        question_set[0].choices.as_deref().map(<[String]>::len),
        Some(2)
    );
    assert_eq!(rewriter.state(), RoundState::AwaitingAnswers);
    assert_eq!(rewriter.round(), 1);
    assert!(oracle.user_prompt(0).contains("Evidence: None"));

    let encoded = serde_json::to_value(&result).expect("result should serialize");
    assert_eq!(encoded["ambiguous"], true);
    assert_eq!(
        encoded["question_set"][0]["level_1_label"],
        "LLM-related ambiguity"
    );
}

#[tokio::test]
async fn answers_fold_into_evidence_and_resolve() {
    let oracle = vietnam_oracle(&[]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");

    let answers = answer_for(&rewriter, END_YEAR);
    let result = rewriter
        .correct(&oracle, &answers, "")
        .await
        .expect("correction should succeed");

    let DetectionResult::Resolved(handoff) = result else {
        panic!("correction should resolve the conversation");
    };
    assert_eq!(handoff.question, VIETNAM_QUESTION);
    assert!(handoff.evidence.contains(END_YEAR));
    assert!(handoff.evidence.contains(TEMPORAL_SCOPE));
    assert_eq!(rewriter.state(), RoundState::Resolved);
    assert!(rewriter.pending_question_set().is_none());
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn correct_before_detect_is_an_invalid_transition() {
    let oracle = ScriptedOracle::new(Vec::<String>::new());
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());

    let error = rewriter
        .correct(&oracle, &[], "")
        .await
        .expect_err("correct must follow detect");

    assert!(matches!(
        error,
        ClarifyError::InvalidTransition {
            operation: "correct",
            state: RoundState::Init
        }
    ));
    assert_eq!(oracle.call_count(), 0);
}

#[tokio::test]
async fn detecting_twice_is_an_invalid_transition() {
    let oracle = vietnam_oracle(&[]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");

    let error = rewriter.detect(&oracle).await.expect_err("second detect must fail");

    assert_eq!(
        error.to_string(),
        "invalid transition: `detect` is not allowed in state AWAITING_ANSWERS"
    );
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn malformed_detection_reply_keeps_init_and_allows_retry() {
    let oracle = ScriptedOracle::new([
        r#"{"has_ambiguity": true, "question_set": [{"question": "#,
        r#"{"has_ambiguity": False, "question_set": []}"#,
    ]);
    let mut rewriter = Rewriter::new("How many drivers are there?", drivers_schema());

    let error = rewriter.detect(&oracle).await.expect_err("truncated reply must fail");
    assert!(matches!(
        error,
        ClarifyError::MalformedOracleReply {
            kind: ReplyKind::Detection,
            ..
        }
    ));
    assert_eq!(rewriter.state(), RoundState::Init);
    assert_eq!(rewriter.round(), 0);

    let retried = rewriter.detect(&oracle).await.expect("retry should succeed");
    assert!(!retried.is_ambiguous());
    assert_eq!(rewriter.state(), RoundState::Resolved);
}

#[tokio::test]
async fn failed_refinement_commits_nothing() {
    let oracle = ScriptedOracle::with_results([
        Ok(detection_reply(&[vietnam_item(), ranking_item()])),
        Ok(choices_reply(&["End Day", "End Year"])),
        Ok(choices_reply(&["results.rank", "driverStandings.position"])),
        Err(OracleError::Transport("timed out".to_string())),
    ]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");

    let answers: Vec<QaAnswer> = rewriter
        .pending_question_set()
        .expect("question set should be pending")
        .iter()
        .zip(["End Year", "driverStandings.position"])
        .map(|(item, answer)| item.answered(answer))
        .collect();
    let error = rewriter
        .correct(&oracle, &answers, "only count drivers from Germany")
        .await
        .expect_err("refinement failure must surface");

    assert!(matches!(error, ClarifyError::OracleUnavailable(_)));
    assert_eq!(rewriter.state(), RoundState::AwaitingAnswers);
    assert!(rewriter.preference_tree().is_empty());
    assert_eq!(rewriter.current_question(), VIETNAM_QUESTION);
    assert_eq!(rewriter.pending_question_set().map(<[_]>::len), Some(2));
}

#[tokio::test]
async fn additional_information_refines_the_question() {
    let refined = "How many German drivers born after the end of Vietnam War have been ranked 2?";
    let reply = format!("Rewritten question: \"{refined}\"");
    let oracle = vietnam_oracle(&[reply.as_str()]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");

    let answers = answer_for(&rewriter, END_YEAR);
    let result = rewriter
        .correct(&oracle, &answers, "  only German drivers ")
        .await
        .expect("correction should succeed");

    let handoff = result.handoff().expect("result should be resolved");
    assert_eq!(handoff.question, refined);
    assert_eq!(rewriter.original_question(), VIETNAM_QUESTION);
    assert!(oracle.user_prompt(2).ends_with(&format!(
        "Original question: {VIETNAM_QUESTION}\nAdditional information: only German drivers\nRefined question:"
    )));
}

#[tokio::test]
async fn follow_up_round_feeds_evidence_back_into_detection() {
    let oracle = vietnam_oracle(&[r#"{"has_ambiguity": false}"#]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");
    let answers = answer_for(&rewriter, END_YEAR);
    rewriter
        .correct(&oracle, &answers, "")
        .await
        .expect("correction should succeed");

    let result = rewriter.follow_up(&oracle).await.expect("follow-up should succeed");

    assert!(!result.is_ambiguous());
    assert_eq!(rewriter.round(), 2);
    let prompt = oracle.user_prompt(2);
    assert!(prompt.contains("Evidence: root\n  LLM-related ambiguity"));
    assert!(prompt.contains(&format!("| A: {END_YEAR}")));
}

#[tokio::test]
async fn failed_follow_up_stays_resolved() {
    let oracle = vietnam_oracle(&["not json at all"]);
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());
    rewriter.detect(&oracle).await.expect("detection should succeed");
    let answers = answer_for(&rewriter, END_YEAR);
    rewriter
        .correct(&oracle, &answers, "")
        .await
        .expect("correction should succeed");

    rewriter
        .follow_up(&oracle)
        .await
        .expect_err("malformed follow-up must fail");

    assert_eq!(rewriter.state(), RoundState::Resolved);
    assert_eq!(rewriter.round(), 1);
}

#[test]
fn reopen_is_only_valid_once_resolved() {
    let mut rewriter = Rewriter::new(VIETNAM_QUESTION, drivers_schema());

    let error = rewriter.reopen().expect_err("fresh conversation cannot reopen");
    assert_eq!(error.code(), "invalid_transition");
    assert_eq!(rewriter.state(), RoundState::Init);
}
