pub mod ambiguity;
pub mod envelope;

pub use ambiguity::{
    AmbiguityItem, DB_RELATED, DetectionResult, DetectionResultWire, LLM_RELATED, QaAnswer,
    QaFact, SqlHandoff, answer_set_schema, detection_result_schema, sql_handoff_schema,
};
pub use envelope::{
    CLARIFY_ENVELOPE_SCHEMA_VERSION, ClarifyEnvelope, ClarifyEnvelopeError,
    ClarifyEnvelopeFailure,
};
