//! The interactive question loop.

use std::{
  fmt::Write as _,
  io::Write as _,
  sync::Arc,
};

use anyhow::Context as _;
use sqlrag_core::{
  AbortReason, GenerationClient, Pipeline, Turn,
  index::VectorIndex,
  model::{EmbeddingModel, TextModel},
  query::QueryExecutor,
};
use sqlrag_gemini::GeminiClient;
use sqlrag_store_sqlite::SqliteExecutor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader};
use tracing::warn;

use crate::settings::AppConfig;

const RULE: &str = "------------------------------------";

/// `quit` or `exit`, ignoring case and surrounding whitespace.
pub fn is_exit_command(line: &str) -> bool {
  let line = line.trim();
  line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// Read one line without its terminator. Invalid UTF-8 is replaced rather
/// than ending the session. `None` at end of input.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
  R: AsyncBufRead + Unpin,
{
  buf.clear();
  if reader.read_until(b'\n', buf).await? == 0 {
    return Ok(None);
  }
  if std::str::from_utf8(buf).is_err() {
    warn!("input line was not valid UTF-8; invalid bytes replaced");
  }
  let line = String::from_utf8_lossy(buf);
  Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
}

/// Everything printed for one finished turn.
pub fn render_turn(turn: &Turn) -> String {
  if let Some(AbortReason::BlankQuestion) = &turn.aborted {
    return format!("{}\n", AbortReason::BlankQuestion);
  }

  let mut out = String::new();
  let _ = writeln!(out, "Processing query (ID: {})...", turn.turn_id);
  if let Some(sql) = &turn.sql {
    let _ = writeln!(out, "Generated SQL: {sql}");
  }

  if let Some(result) = &turn.result {
    if result.is_empty() {
      let _ = writeln!(out, "SQL query executed successfully, but returned no results.");
    } else {
      let _ = writeln!(out, "SQL query returned {} row(s).", result.rows.len());
    }
  }

  if let Some(reason) = &turn.aborted {
    let _ = writeln!(out, "{reason}");
    return out;
  }

  if turn.evidence.is_empty() {
    let _ = writeln!(out, "Could not retrieve relevant data from the vector store for answering.");
  } else {
    let _ = writeln!(out, "\n--- Data Retrieved for Answering ---");
    for line in &turn.evidence {
      let _ = writeln!(out, "{line}");
    }
    let _ = writeln!(out, "{RULE}");
  }

  if let Some(answer) = &turn.answer {
    let _ = writeln!(out, "\nAnswer:\n{answer}");
  }
  out
}

/// Build the pipeline from `config` and answer questions from stdin until
/// `quit`, `exit` or end of input.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
  let layer = config.load_semantic_layer()?;
  let gemini = GeminiClient::new(config.gemini_config()?).context("failed to build Gemini client")?;
  let store = config.open_vector_store().await?;

  if !config.database_path.exists() {
    warn!(
      path = %config.database_path.display(),
      "database file not found; queries will fail until it exists (see `sqlrag seed`)"
    );
  }

  let (sql_params, answer_params) = config.generation_params();
  let pipeline = Pipeline::new(
    &layer,
    GenerationClient::new(Arc::new(gemini)).with_params(sql_params, answer_params),
    SqliteExecutor::new(&config.database_path),
    store.clone(),
    config.pipeline_settings(),
  );

  println!("Text-to-SQL RAG Chatbot (Terminal Interface)");
  println!("{}", "-".repeat(40));
  println!("Semantic layer and vector store initialised. Ready to answer questions.");
  println!("Type 'quit' or 'exit' to end the session.");

  let outcome = session(&pipeline, BufReader::new(tokio::io::stdin())).await;

  drop(pipeline);
  let closed = store.close().await.context("failed to close vector store");
  println!("\nExiting chatbot. Goodbye!");
  outcome.and(closed)
}

/// Prompt, read and answer until an exit command or end of input.
async fn session<M, X, V, R>(pipeline: &Pipeline<M, X, V>, mut input: R) -> anyhow::Result<()>
where
  M: TextModel + EmbeddingModel,
  X: QueryExecutor,
  V: VectorIndex,
  R: AsyncBufRead + Unpin,
{
  let mut buf = Vec::new();
  loop {
    print!("\nAsk a question: ");
    std::io::stdout().flush().context("failed to flush stdout")?;

    let Some(line) = read_line(&mut input, &mut buf).await.context("failed to read from stdin")?
    else {
      break;
    };
    if is_exit_command(&line) {
      break;
    }

    let turn = pipeline.run_turn(&line).await;
    print!("{}", render_turn(&turn));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use sqlrag_core::{
    TurnStage,
    gate::GateRejection,
    query::{CellValue, QueryResult},
  };

  use super::*;

  fn answered() -> Turn {
    let mut turn = Turn::new("How much did Charlie spend?");
    turn.sql = Some("SELECT SUM(amount) AS total FROM orders WHERE customer_id = 3".into());
    turn.result = Some(QueryResult {
      columns: vec!["total".into()],
      rows:    vec![vec![CellValue::Real(273.0)]],
    });
    turn.stored = 1;
    turn.evidence = vec!["total: 273".into()];
    turn.answer = Some("Charlie spent 273 in total.".into());
    turn.stage = TurnStage::Answered;
    turn
  }

  #[test]
  fn exit_commands() {
    assert!(is_exit_command("quit"));
    assert!(is_exit_command("  EXIT \n"));
    assert!(!is_exit_command("quit please"));
    assert!(!is_exit_command(""));
  }

  #[tokio::test]
  async fn invalid_utf8_input_is_replaced_not_fatal() {
    let mut input: &[u8] = b"caf\xe9 orders?\r\nquit\nlast";
    let mut buf = Vec::new();

    let first = read_line(&mut input, &mut buf).await.unwrap();
    assert_eq!(first.as_deref(), Some("caf\u{fffd} orders?"));
    let second = read_line(&mut input, &mut buf).await.unwrap().unwrap();
    assert!(is_exit_command(&second));
    assert_eq!(read_line(&mut input, &mut buf).await.unwrap().as_deref(), Some("last"));
    assert_eq!(read_line(&mut input, &mut buf).await.unwrap(), None);
  }

  #[test]
  fn answered_turn_shows_every_stage() {
    let turn = answered();
    let out = render_turn(&turn);

    assert!(out.starts_with(&format!("Processing query (ID: {})...", turn.turn_id)));
    assert!(out.contains("Generated SQL: SELECT SUM(amount)"));
    assert!(out.contains("SQL query returned 1 row(s)."));
    assert!(out.contains("--- Data Retrieved for Answering ---\ntotal: 273\n"));
    assert!(out.ends_with("Answer:\nCharlie spent 273 in total.\n"));
  }

  #[test]
  fn empty_result_and_missing_evidence() {
    let mut turn = answered();
    turn.result = Some(QueryResult { columns: vec!["total".into()], rows: Vec::new() });
    turn.evidence.clear();
    let out = render_turn(&turn);

    assert!(out.contains("returned no results."));
    assert!(out.contains("Could not retrieve relevant data"));
    assert!(!out.contains("--- Data Retrieved"));
  }

  #[test]
  fn aborted_turn_stops_at_the_reason() {
    let mut turn = Turn::new("delete everything");
    turn.sql = Some("DELETE FROM orders".into());
    turn.stage = TurnStage::SqlGenerated;
    turn.aborted = Some(AbortReason::Rejected(GateRejection::NotAQuery));
    let out = render_turn(&turn);

    assert!(out.contains("Generated SQL: DELETE FROM orders"));
    assert!(out.contains("Not executing the generated SQL"));
    assert!(!out.contains("Answer:"));
  }

  #[test]
  fn blank_question_only_asks_again() {
    let mut turn = Turn::new("   ");
    turn.aborted = Some(AbortReason::BlankQuestion);
    assert_eq!(render_turn(&turn), "Please enter a question.\n");
  }
}
