//! [`Pipeline`] drives one turn from question to answer.
//!
//! Stages: generate SQL, validate it, execute it, store the rows as
//! embedded documents, retrieve evidence by similarity to the question,
//! and synthesise the answer. SQL generation, validation and execution
//! failures end the turn early; storage and retrieval failures only reduce
//! the evidence available to the answer.

use serde::{Deserialize, Serialize};

use crate::{
  gate::{self, GateMode},
  generation::GenerationClient,
  index::VectorIndex,
  model::{EmbeddingModel, TextModel},
  query::QueryExecutor,
  results::{DEFAULT_EMBED_CONCURRENCY, ResultStore, RetentionPolicy},
  semantic::SemanticLayer,
  turn::{AbortReason, Turn, TurnStage},
};

/// Evidence handed to answer synthesis when retrieval found nothing.
pub const NO_EVIDENCE: &str = "No relevant data found.";

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
  /// Number of documents retrieved as evidence.
  pub top_k:             usize,
  pub gate:              GateMode,
  pub retention:         RetentionPolicy,
  pub embed_concurrency: usize,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      top_k:             5,
      gate:              GateMode::default(),
      retention:         RetentionPolicy::default(),
      embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
    }
  }
}

pub struct Pipeline<M, X, V> {
  schema_text: String,
  generation:  GenerationClient<M>,
  executor:    X,
  results:     ResultStore<M, V>,
  settings:    PipelineSettings,
}

impl<M, X, V> Pipeline<M, X, V> {
  /// Build a pipeline grounded on `layer`. The layer is rendered once here.
  pub fn new(
    layer: &SemanticLayer,
    generation: GenerationClient<M>,
    executor: X,
    index: V,
    settings: PipelineSettings,
  ) -> Self {
    let results = ResultStore::new(generation.clone(), index)
      .with_retention(settings.retention)
      .with_concurrency(settings.embed_concurrency);

    Self {
      schema_text: layer.render(),
      generation,
      executor,
      results,
      settings,
    }
  }

  pub fn results(&self) -> &ResultStore<M, V> { &self.results }

  pub fn executor(&self) -> &X { &self.executor }
}

impl<M, X, V> Pipeline<M, X, V>
where
  M: TextModel + EmbeddingModel,
  X: QueryExecutor,
  V: VectorIndex,
{
  /// Run one turn for `question`. Always returns the turn record; check
  /// [`Turn::aborted`] for early exits.
  pub async fn run_turn(&self, question: &str) -> Turn {
    let mut turn = Turn::new(question);
    if turn.question.is_empty() {
      turn.abort(AbortReason::BlankQuestion);
      return turn;
    }
    tracing::info!(turn_id = %turn.turn_id, question = %turn.question, "processing question");

    let sql = match self.generation.generate_sql(&turn.question, &self.schema_text).await {
      Ok(sql) => sql,
      Err(e) => {
        turn.abort(AbortReason::SqlGeneration(e));
        return turn;
      }
    };
    turn.sql = Some(sql.clone());
    turn.advance(TurnStage::SqlGenerated);

    if let Err(rejection) = gate::check(&sql, self.settings.gate) {
      turn.abort(AbortReason::Rejected(rejection));
      return turn;
    }
    turn.advance(TurnStage::Validated);

    let result = match self.executor.execute(&sql).await {
      Ok(result) => result,
      Err(e) => {
        turn.abort(AbortReason::Execution(e));
        return turn;
      }
    };
    tracing::info!(turn_id = %turn.turn_id, rows = result.rows.len(), "query executed");
    turn.advance(TurnStage::Executed);

    turn.stored = self.results.store(&result, turn.turn_id).await;
    turn.result = Some(result);
    turn.advance(TurnStage::Stored);

    // Retrieval is anchored to the question, not the SQL or the raw rows.
    turn.evidence = self
      .results
      .retrieve(&turn.question, self.settings.top_k, turn.turn_id)
      .await;
    turn.advance(TurnStage::Retrieved);

    let evidence = if turn.evidence.is_empty() {
      NO_EVIDENCE.to_owned()
    } else {
      turn.evidence.join("\n")
    };
    turn.answer = Some(self.generation.generate_answer(&turn.question, &evidence).await);
    turn.advance(TurnStage::Answered);

    turn
  }
}
