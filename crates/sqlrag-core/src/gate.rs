//! Validation gate for generated SQL.
//!
//! Only read-only queries may reach the relational store. The gate always
//! applies the prefix check (the text must start with `select` or `with`).
//! In [`GateMode::Strict`] it also classifies the statement lexically:
//! comments and quoted text are skipped, a leading `WITH` clause is walked
//! to find the statement it qualifies, and only a single `SELECT` or
//! `VALUES` statement is accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
  /// Prefix check only.
  Prefix,
  /// Prefix check plus statement classification.
  #[default]
  Strict,
}

/// Why generated SQL was not executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateRejection {
  #[error("generated text does not appear to be a SELECT or WITH query")]
  NotAQuery,
  #[error("statement would modify the database ({0})")]
  Write(String),
  #[error("generated text contains more than one statement")]
  MultipleStatements,
  #[error("statement kind could not be recognised")]
  Unrecognised,
}

/// What a piece of SQL text does, as far as the classifier can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
  Read,
  /// Carries the keyword that makes it a write, lowercased.
  Write(String),
  Multiple,
  Empty,
  Unknown,
}

/// `^\s*(select|with)`, case-insensitive.
pub fn has_query_prefix(sql: &str) -> bool {
  let lowered = sql.trim_start().to_lowercase();
  lowered.starts_with("select") || lowered.starts_with("with")
}

/// Decide whether `sql` may be executed under `mode`.
pub fn check(sql: &str, mode: GateMode) -> Result<(), GateRejection> {
  if !has_query_prefix(sql) {
    return Err(GateRejection::NotAQuery);
  }
  if mode == GateMode::Prefix {
    return Ok(());
  }
  match classify(sql) {
    StatementKind::Read => Ok(()),
    StatementKind::Write(keyword) => Err(GateRejection::Write(keyword)),
    StatementKind::Multiple => Err(GateRejection::MultipleStatements),
    StatementKind::Empty | StatementKind::Unknown => Err(GateRejection::Unrecognised),
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

const WRITE_KEYWORDS: &[&str] = &[
  "insert", "update", "delete", "replace", "upsert", "create", "drop", "alter",
  "attach", "detach", "pragma", "vacuum", "reindex", "analyze", "begin",
  "commit", "end", "rollback", "savepoint", "release",
];

/// Keywords that can follow a `WITH` clause as the main statement.
const MAIN_KEYWORDS: &[&str] = &["select", "values", "insert", "update", "delete", "replace"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Word(String),
  Open,
  Close,
  Semicolon,
  Other,
}

pub fn classify(sql: &str) -> StatementKind {
  let tokens = tokenize(sql);
  let statements: Vec<&[Token]> = tokens
    .split(|t| *t == Token::Semicolon)
    .filter(|s| !s.is_empty())
    .collect();

  match statements.as_slice() {
    [] => StatementKind::Empty,
    [single] => classify_statement(single),
    _ => StatementKind::Multiple,
  }
}

fn classify_statement(tokens: &[Token]) -> StatementKind {
  let Some(Token::Word(first)) = tokens.first() else {
    return StatementKind::Unknown;
  };

  match first.as_str() {
    "select" | "values" => StatementKind::Read,
    "with" => {
      let mut depth = 0usize;
      for token in &tokens[1..] {
        match token {
          Token::Open => depth += 1,
          Token::Close => depth = depth.saturating_sub(1),
          Token::Word(w) if depth == 0 && MAIN_KEYWORDS.contains(&w.as_str()) => {
            return match w.as_str() {
              "select" | "values" => StatementKind::Read,
              other => StatementKind::Write(other.to_owned()),
            };
          }
          _ => {}
        }
      }
      StatementKind::Unknown
    }
    kw if WRITE_KEYWORDS.contains(&kw) => StatementKind::Write(kw.to_owned()),
    _ => StatementKind::Unknown,
  }
}

/// Split SQL into coarse tokens, dropping comments and quoted text.
fn tokenize(sql: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut chars = sql.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      c if c.is_whitespace() => {}
      '-' if chars.peek() == Some(&'-') => {
        for n in chars.by_ref() {
          if n == '\n' {
            break;
          }
        }
      }
      '/' if chars.peek() == Some(&'*') => {
        chars.next();
        let mut prev = '\0';
        for n in chars.by_ref() {
          if prev == '*' && n == '/' {
            break;
          }
          prev = n;
        }
      }
      '\'' | '"' | '`' | '[' => {
        let close = if c == '[' { ']' } else { c };
        // A doubled quote inside a literal is an escaped quote.
        while let Some(n) = chars.next() {
          if n == close {
            if close != ']' && chars.peek() == Some(&close) {
              chars.next();
              continue;
            }
            break;
          }
        }
        tokens.push(Token::Other);
      }
      '(' => tokens.push(Token::Open),
      ')' => tokens.push(Token::Close),
      ';' => tokens.push(Token::Semicolon),
      c if c.is_alphabetic() || c == '_' => {
        let mut word = String::from(c);
        while let Some(&n) = chars.peek() {
          if n.is_alphanumeric() || n == '_' || n == '$' {
            word.push(n);
            chars.next();
          } else {
            break;
          }
        }
        tokens.push(Token::Word(word.to_lowercase()));
      }
      _ => tokens.push(Token::Other),
    }
  }

  tokens
}
