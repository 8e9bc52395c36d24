//! Prompt construction for every oracle call site.
//!
//! Builders return the full message list (system + user) so call sites never
//! assemble prompts by hand.

use serde_json::json;

use crate::models::{AmbiguityItem, QaFact};
use crate::oracle::Message;

const DETECTION_SYSTEM: &str = "You find inherent ambiguity in natural-language questions asked \
against a relational database. Return only the requested JSON with no explanation.";

const MERGE_SYSTEM: &str = "You merge question-answer lists. Given an existing list and a new \
question-answer pair, replace the one existing pair whose question has the same meaning as the \
new question, or append the new pair when none does. Return ONLY the merged list as a JSON array.";

const REFINE_SYSTEM: &str = "You refine database questions by folding new information into \
them. Respond ONLY with the refined question, without labels, formatting or explanation.";

const CHOICES_SYSTEM: &str = "You turn clarification questions into answer options. Output a \
single valid JSON object with a `choices` list of strings and nothing else.";

const SQL_SYSTEM: &str = "You are a careful SQL author. Reply with a single SQL statement only.";

const LEVEL_TAXONOMY: &str = r#"Level 1 labels:
- "DB-related ambiguity": the question is underspecified with respect to the schema or stored values, so retrieval may be wrong or incomplete.
- "LLM-related ambiguity": the question relies on external knowledge that may be misapplied.
Level 2 labels for DB-related ambiguity:
- "Unclear schema reference": several tables or columns are plausible for filtering, ranking or aggregation.
- "Unclear value reference": the mentioned value may not match how values are stored (abbreviations, synonyms, partial matches).
- "Missing SQL-related keywords": the intended operation (count, total, per-item listing) is not stated.
Level 2 labels for LLM-related ambiguity:
- "Unclear knowledge source": it is unclear whether to read a column or infer the information.
- "Insufficient reasoning context": external reasoning lacks required parameters (dates, currencies, units).
- "Conflicting knowledge": the question assumes facts that contradict the world or the data.
- "Ambiguous temporal/spatial scope": a time or place constraint admits several granularities."#;

const DETECTION_FORMAT: &str = r#"{
  "has_ambiguity": true,
  "question_set": [
    {
      "question": "clarifying question for the user",
      "level_1_label": "DB-related ambiguity | LLM-related ambiguity",
      "level_2_label": "one Level 2 label",
      "description": "string or JSON object listing the possible interpretations"
    }
  ]
}"#;

#[must_use]
pub fn ambiguity_detection(question: &str, schema: &str, evidence: &str) -> Vec<Message> {
    let evidence = if evidence.trim().is_empty() {
        "None"
    } else {
        evidence
    };
    let user = format!(
        "## Task\n\
         Decide whether the question below has more than one reasonable interpretation given the \
         schema and the evidence, and write clarifying questions for every ambiguity the evidence \
         does not already resolve.\n\n\
         ## Labels\n{LEVEL_TAXONOMY}\n\n\
         ## Instructions\n\
         1. Ask each clarifying question as yes/no, binary or multiple choice.\n\
         2. Assign exactly one Level 1 and one Level 2 label per question.\n\
         3. In the description, list every plausible interpretation: candidate columns with their \
         table and meaning for schema references, every concrete option for temporal or spatial \
         scope, and at least two interpretations otherwise.\n\
         4. A question is not ambiguous when only one interpretation is plausible. Return \
         has_ambiguity false and an empty question_set in that case.\n\n\
         ## Response format (strict JSON)\n{DETECTION_FORMAT}\n\n\
         Question: {question}\n\
         Schema: {schema}\n\
         Evidence: {evidence}\n\n\
         Respond only with the JSON object."
    );

    vec![Message::system(DETECTION_SYSTEM), Message::user(user)]
}

#[must_use]
pub fn node_merge(existing: &[QaFact], new_fact: &QaFact) -> Vec<Message> {
    let old_list = serde_json::to_string_pretty(existing).unwrap_or_else(|_| "[]".to_string());
    let new_pair = serde_json::to_string_pretty(new_fact).unwrap_or_else(|_| "{}".to_string());
    let example_old = json!([
        {"question": "Which column ranks drivers?", "answer": "results.rank"},
        {"question": "Which end date of the war?", "answer": "End year"}
    ]);
    let example_new = json!({"question": "What column should be used to rank the drivers?", "answer": "driverStandings.position"});
    let example_out = json!([
        {"question": "What column should be used to rank the drivers?", "answer": "driverStandings.position"},
        {"question": "Which end date of the war?", "answer": "End year"}
    ]);

    let user = format!(
        "## Task\n\
         Merge new_pair into old_list.\n\n\
         ## Rules\n\
         1. Compare the question of new_pair with every question in old_list. Questions with the \
         same intent count as a match even when worded differently.\n\
         2. At most one item can match. Replace it in place with new_pair.\n\
         3. When nothing matches, append new_pair at the end.\n\
         4. Copy every other item unchanged and keep the original order.\n\
         5. Return ONLY the merged JSON array of {{\"question\", \"answer\"}} objects.\n\n\
         ## Example\n\
         old_list:\n{example_old}\n\
         new_pair:\n{example_new}\n\
         merged:\n{example_out}\n\n\
         ## Input\n\
         old_list:\n{old_list}\n\n\
         new_pair:\n{new_pair}\n\n\
         merged:"
    );

    vec![Message::system(MERGE_SYSTEM), Message::user(user)]
}

#[must_use]
pub fn question_refine(question: &str, additional_info: &str) -> Vec<Message> {
    let user = format!(
        "## Task\n\
         Combine the original question and the additional information into one complete, natural \
         question.\n\n\
         ## Rules\n\
         1. Keep every constraint, detail and intent of the original question verbatim unless the \
         additional information directly contradicts it.\n\
         2. Integrate every new requirement from the additional information.\n\
         3. Where the two conflict, the additional information wins. This is the only case in \
         which the original may change.\n\
         4. Output a single question, not a list of criteria.\n\n\
         ## Example\n\
         Original question: Which Asian countries have a GDP per capita above $30,000?\n\
         Additional information: Exclude island nations.\n\
         Refined question: Which Asian countries that are not island nations have a GDP per \
         capita above $30,000?\n\n\
         Original question: {question}\n\
         Additional information: {additional_info}\n\
         Refined question:"
    );

    vec![Message::system(REFINE_SYSTEM), Message::user(user)]
}

#[must_use]
pub fn clarification_choices(item: &AmbiguityItem) -> Vec<Message> {
    let description = item.description_text();
    let user = format!(
        "## Task\n\
         Turn the clarification question and its description into answer options a \
         non-technical user can pick from.\n\n\
         ## Rules\n\
         - Each option is a self-contained sentence.\n\
         - Options are mutually exclusive and share one format (option, then explanation or \
         evidence).\n\
         - For column choices, mention column name, table name and what the column means.\n\n\
         ## Example\n\
         Question: Do you mean drivers born after the end day or the end year of the Vietnam War?\n\
         Description: The end day is 1975-04-30, the end year is 1975.\n\
         Output: {{\"choices\": [\"End Day: April 30, 1975.\", \"End Year: Dec 31, 1975.\"]}}\n\n\
         Question: {question}\n\
         Description: {description}\n\
         Output:",
        question = item.question,
    );

    vec![Message::system(CHOICES_SYSTEM), Message::user(user)]
}

#[must_use]
pub fn sql_generation(dialect: &str, question: &str, schema: &str, evidence: Option<&str>) -> Vec<Message> {
    let evidence = evidence
        .filter(|text| !text.trim().is_empty())
        .unwrap_or("None");
    let user = format!(
        "You are a {dialect} expert. Read the database schema and the clarified preferences, \
         then write one {dialect} query that answers the question.\n\n\
         [Schema]\n{schema}\n\n\
         [Clarified preferences]\n{evidence}\n\n\
         [Question]\n{question}\n\n\
         Reply with the SQL only, inside a ```sql fence."
    );

    vec![Message::system(SQL_SYSTEM), Message::user(user)]
}
