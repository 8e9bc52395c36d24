use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{ClarifyError, ClarifyResult};
use crate::models::{DetectionResult, QaAnswer};
use crate::oracle::LanguageOracle;
use crate::rewriter::Rewriter;
use crate::session::{SessionHandle, SessionId, SessionStore};

/// Result of one conversation turn, tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub result: DetectionResult,
}

/// Caller-facing protocol over a session store: `start`, `answer`, `follow_up`, `close`.
#[derive(Clone)]
pub struct Conversation {
    store: Arc<dyn SessionStore>,
    oracle: Arc<dyn LanguageOracle>,
}

impl Conversation {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, oracle: Arc<dyn LanguageOracle>) -> Self {
        Self { store, oracle }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Opens a session for `question` and runs the first detection pass.
    ///
    /// The session is only registered once detection succeeds, so a failed
    /// first turn leaves nothing behind.
    pub async fn start(&self, question: &str, schema: &str) -> ClarifyResult<Turn> {
        let mut rewriter = Rewriter::new(question, schema);
        let result = rewriter.detect(self.oracle.as_ref()).await?;
        let session_id = self.store.create(rewriter);
        info!(session = %session_id, ambiguous = result.is_ambiguous(), "conversation started");

        Ok(Turn { session_id, result })
    }

    pub async fn answer(
        &self,
        session_id: SessionId,
        answers: &[QaAnswer],
        additional_info: &str,
    ) -> ClarifyResult<Turn> {
        let handle = self.session(session_id)?;
        let mut rewriter = handle.lock().await;
        let result = rewriter
            .correct(self.oracle.as_ref(), answers, additional_info)
            .await?;

        Ok(Turn { session_id, result })
    }

    /// Runs another detection round on a resolved session using its accumulated evidence.
    pub async fn follow_up(&self, session_id: SessionId) -> ClarifyResult<Turn> {
        let handle = self.session(session_id)?;
        let mut rewriter = handle.lock().await;
        let result = rewriter.follow_up(self.oracle.as_ref()).await?;

        Ok(Turn { session_id, result })
    }

    pub fn close(&self, session_id: SessionId) -> bool {
        self.store.evict(session_id)
    }

    fn session(&self, session_id: SessionId) -> ClarifyResult<SessionHandle> {
        self.store
            .get(session_id)
            .ok_or(ClarifyError::SessionNotFound(session_id))
    }
}
