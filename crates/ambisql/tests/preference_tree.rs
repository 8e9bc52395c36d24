mod support;

use ambisql::error::ClarifyError;
use ambisql::models::QaFact;
use ambisql::preference::PreferenceTree;
use serde_json::json;

use support::{FailingOracle, SCHEMA_REFERENCE, ScriptedOracle, TEMPORAL_SCOPE};

const LLM: &str = "LLM-related ambiguity";
const DB: &str = "DB-related ambiguity";

fn merged(facts: &[(&str, &str)]) -> String {
    let list: Vec<_> = facts
        .iter()
        .map(|(question, answer)| json!({"question": question, "answer": answer}))
        .collect();
    serde_json::to_string(&list).expect("merge reply should serialize")
}

#[tokio::test]
async fn first_fact_for_a_topic_needs_no_oracle() {
    let mut tree = PreferenceTree::new();

    tree.add_fact(&FailingOracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q1", "A1"))
        .await
        .expect("first fact should be stored without an oracle call");

    let leaf = tree
        .lookup_leaf(LLM, TEMPORAL_SCOPE)
        .expect("leaf should exist");
    assert_eq!(leaf.facts, vec![QaFact::new("Q1", "A1")]);
}

#[tokio::test]
async fn repeated_topic_never_duplicates_nodes() {
    let oracle = ScriptedOracle::new([merged(&[("Q1", "A1"), ("Q2", "A2")])]);
    let mut tree = PreferenceTree::new();

    let first = tree
        .add_fact(&oracle, DB, SCHEMA_REFERENCE, QaFact::new("Q1", "A1"))
        .await
        .expect("first fact should be stored");
    let second = tree
        .add_fact(&oracle, DB, SCHEMA_REFERENCE, QaFact::new("Q2", "A2"))
        .await
        .expect("second fact should merge");

    assert_eq!(first, second);
    assert_eq!(tree.categories().len(), 1);
    assert_eq!(tree.categories()[0].subcategories.len(), 1);
    assert_eq!(tree.fact_count(), 2);

    let looked_up = tree.lookup_leaf(DB, SCHEMA_REFERENCE).expect("leaf should exist");
    let again = tree.lookup_leaf(DB, SCHEMA_REFERENCE).expect("leaf should exist");
    assert!(std::ptr::eq(looked_up, again));
}

#[tokio::test]
async fn same_intent_answer_replaces_previous_one() {
    let oracle = ScriptedOracle::new([merged(&[("Q1", "A2")])]);
    let mut tree = PreferenceTree::new();

    tree.add_fact(&oracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q1", "A1"))
        .await
        .expect("first fact should be stored");
    tree.add_fact(&oracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q1", "A2"))
        .await
        .expect("replacement should merge");

    let leaf = tree.lookup_leaf(LLM, TEMPORAL_SCOPE).expect("leaf should exist");
    assert_eq!(leaf.facts, vec![QaFact::new("Q1", "A2")]);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn distinct_question_is_appended() {
    let oracle = ScriptedOracle::new([merged(&[("Q1", "A1"), ("Q2", "A2")])]);
    let mut tree = PreferenceTree::new();

    tree.add_fact(&oracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q1", "A1"))
        .await
        .expect("first fact should be stored");
    tree.add_fact(&oracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q2", "A2"))
        .await
        .expect("append should merge");

    let leaf = tree.lookup_leaf(LLM, TEMPORAL_SCOPE).expect("leaf should exist");
    assert_eq!(
        leaf.facts,
        vec![QaFact::new("Q1", "A1"), QaFact::new("Q2", "A2")]
    );
}

#[tokio::test]
async fn failed_merge_leaves_leaf_untouched() {
    let mut tree = PreferenceTree::new();
    tree.add_fact(&FailingOracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q1", "A1"))
        .await
        .expect("first fact should be stored");

    let error = tree
        .add_fact(&FailingOracle, LLM, TEMPORAL_SCOPE, QaFact::new("Q2", "A2"))
        .await
        .expect_err("merge needs the oracle");

    assert!(matches!(error, ClarifyError::OracleUnavailable(_)));
    let leaf = tree.lookup_leaf(LLM, TEMPORAL_SCOPE).expect("leaf should exist");
    assert_eq!(leaf.facts, vec![QaFact::new("Q1", "A1")]);
}

#[tokio::test]
async fn evidence_renders_depth_first_in_insertion_order() {
    let mut tree = PreferenceTree::new();
    tree.add_fact(
        &FailingOracle,
        LLM,
        TEMPORAL_SCOPE,
        QaFact::new("End day or end year of the Vietnam War?", "End Year: 1975"),
    )
    .await
    .expect("fact should be stored");
    tree.add_fact(
        &FailingOracle,
        DB,
        SCHEMA_REFERENCE,
        QaFact::new("Which column ranks drivers?", "driverStandings.position"),
    )
    .await
    .expect("fact should be stored");

    let evidence = tree.render_evidence();
    insta::assert_snapshot!(evidence, @r"
    root
      LLM-related ambiguity
        LLM-related ambiguity Ambiguous temporal/spatial scope
          Q: End day or end year of the Vietnam War? | A: End Year: 1975
      DB-related ambiguity
        DB-related ambiguity Unclear schema reference
          Q: Which column ranks drivers? | A: driverStandings.position
    ");
    assert_eq!(tree.render_evidence(), evidence);

    let order: Vec<_> = tree.facts().map(|(level1, _, fact)| (level1, fact.answer.as_str())).collect();
    assert_eq!(
        order,
        vec![(LLM, "End Year: 1975"), (DB, "driverStandings.position")]
    );
}

#[test]
fn tree_serializes_as_ordered_document() {
    let tree = PreferenceTree::new();
    let encoded = serde_json::to_value(&tree).expect("tree should serialize");

    assert_eq!(encoded, json!({"categories": []}));
    assert!(tree.is_empty());
}
