//! One question → answer cycle and how far it got.

use std::fmt;

use uuid::Uuid;

use crate::{Error, gate::GateRejection, query::QueryResult};

/// Pipeline stages, in the order a successful turn passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TurnStage {
  Start,
  SqlGenerated,
  Validated,
  Executed,
  Stored,
  Retrieved,
  Answered,
}

/// Why a turn stopped before producing an answer.
#[derive(Debug)]
pub enum AbortReason {
  /// Not a pipeline failure: the user should simply ask again.
  BlankQuestion,
  SqlGeneration(Error),
  Rejected(GateRejection),
  Execution(Error),
}

impl fmt::Display for AbortReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::BlankQuestion => f.write_str("Please enter a question."),
      Self::SqlGeneration(Error::SafetyBlocked(feedback)) => write!(
        f,
        "Could not generate a SQL query: the request was blocked by safety filters ({feedback})."
      ),
      Self::SqlGeneration(e) => write!(f, "Could not generate a SQL query: {e}"),
      Self::Rejected(rejection) => write!(f, "Not executing the generated SQL: {rejection}."),
      Self::Execution(e) => write!(f, "Error executing SQL query: {e}"),
    }
  }
}

/// Everything one turn produced. Owned by the caller once the turn ends;
/// nothing in it is kept by the pipeline.
#[derive(Debug)]
pub struct Turn {
  pub turn_id:  Uuid,
  pub question: String,
  pub sql:      Option<String>,
  pub result:   Option<QueryResult>,
  /// Number of result documents written to the vector index.
  pub stored:   usize,
  /// Retrieved document texts, nearest first.
  pub evidence: Vec<String>,
  pub answer:   Option<String>,
  /// Last stage reached.
  pub stage:    TurnStage,
  pub aborted:  Option<AbortReason>,
}

impl Turn {
  pub fn new(question: &str) -> Self {
    Self {
      turn_id:  Uuid::new_v4(),
      question: question.trim().to_owned(),
      sql:      None,
      result:   None,
      stored:   0,
      evidence: Vec::new(),
      answer:   None,
      stage:    TurnStage::Start,
      aborted:  None,
    }
  }

  pub fn is_answered(&self) -> bool {
    self.aborted.is_none() && self.stage == TurnStage::Answered
  }

  pub(crate) fn advance(&mut self, stage: TurnStage) {
    tracing::debug!(turn_id = %self.turn_id, from = ?self.stage, to = ?stage, "turn advanced");
    self.stage = stage;
  }

  pub(crate) fn abort(&mut self, reason: AbortReason) {
    tracing::warn!(turn_id = %self.turn_id, stage = ?self.stage, %reason, "turn aborted");
    self.aborted = Some(reason);
  }
}
