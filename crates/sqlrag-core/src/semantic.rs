//! Semantic layer: the schema description that grounds SQL generation.
//!
//! The layer is a strongly-typed tree (database → tables → columns) parsed
//! from JSON and validated once at startup. It is immutable afterwards and
//! shared read-only by every turn.

use std::{collections::HashSet, fmt::Write as _, io, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The root of the semantic layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticLayer {
  pub database: DatabaseInfo,
  /// Order is significant: it is the order the generator sees.
  #[serde(default)]
  pub tables:   Vec<TableInfo>,
}

/// Identity of the described database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
  pub technical_name: String,
  pub human_name:     String,
  pub description:    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
  pub technical_name: String,
  #[serde(default)]
  pub human_names:    Vec<String>,
  pub description:    String,
  #[serde(default)]
  pub columns:        Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
  pub technical_name: String,
  #[serde(default)]
  pub human_names:    Vec<String>,
  pub data_type:      String,
  pub description:    String,
  /// Stored code → human meaning, e.g. `"CA" → "California"`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value_map:      Option<IndexMap<String, String>>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl SemanticLayer {
  /// Read and validate the semantic layer stored at `path`.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();

    let raw = std::fs::read_to_string(path).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => Error::SemanticLayerNotFound(path.to_path_buf()),
      _ => Error::SemanticLayerLoad { path: path.to_path_buf(), source },
    })?;

    let layer: Self = serde_json::from_str(&raw).map_err(|source| {
      Error::SemanticLayerParse { path: path.to_path_buf(), source }
    })?;

    layer.validate()?;
    tracing::info!(
      path = %path.display(),
      tables = layer.tables.len(),
      "semantic layer loaded"
    );
    Ok(layer)
  }

  /// Parse a semantic layer from an in-memory JSON document.
  pub fn from_json_str(raw: &str) -> Result<Self> {
    let layer: Self = serde_json::from_str(raw).map_err(|source| {
      Error::SemanticLayerParse { path: "<inline>".into(), source }
    })?;
    layer.validate()?;
    Ok(layer)
  }

  /// Technical names must be non-empty and unique within their scope.
  fn validate(&self) -> Result<()> {
    if self.database.technical_name.trim().is_empty() {
      return Err(Error::InvalidSemanticLayer(
        "database technical_name is empty".into(),
      ));
    }

    let mut tables = HashSet::new();
    for table in &self.tables {
      if table.technical_name.trim().is_empty() {
        return Err(Error::InvalidSemanticLayer("table with empty technical_name".into()));
      }
      if !tables.insert(table.technical_name.as_str()) {
        return Err(Error::InvalidSemanticLayer(format!(
          "duplicate table {:?}",
          table.technical_name
        )));
      }

      let mut columns = HashSet::new();
      for column in &table.columns {
        if column.technical_name.trim().is_empty() {
          return Err(Error::InvalidSemanticLayer(format!(
            "column with empty technical_name in table {:?}",
            table.technical_name
          )));
        }
        if !columns.insert(column.technical_name.as_str()) {
          return Err(Error::InvalidSemanticLayer(format!(
            "duplicate column {:?} in table {:?}",
            column.technical_name, table.technical_name
          )));
        }
      }
    }
    Ok(())
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

impl SemanticLayer {
  /// Render the schema tree as a prompt-ready text block.
  ///
  /// Deterministic: equal layers always render to byte-identical text, in
  /// the order the tables and columns were loaded.
  pub fn render(&self) -> String {
    let mut out = String::new();
    let db = &self.database;

    // Writing into a `String` cannot fail.
    let _ = writeln!(out, "Database: {} ({})", db.technical_name, db.human_name);
    let _ = writeln!(out, "Description: {}", db.description);

    for table in &self.tables {
      out.push('\n');
      let _ = writeln!(
        out,
        "Table: {}{}",
        table.technical_name,
        aliases(&table.human_names)
      );
      let _ = writeln!(out, "  Description: {}", table.description);
      let _ = writeln!(out, "  Columns:");

      for column in &table.columns {
        let _ = writeln!(
          out,
          "    - {}{}",
          column.technical_name,
          aliases(&column.human_names)
        );
        let _ = writeln!(out, "      Type: {}", column.data_type);
        let _ = writeln!(out, "      Description: {}", column.description);
        if let Some(map) = column.value_map.as_ref().filter(|m| !m.is_empty()) {
          let pairs: Vec<String> =
            map.iter().map(|(code, meaning)| format!("{code} → {meaning}")).collect();
          let _ = writeln!(out, "      Value Mapping: {}", pairs.join(", "));
        }
      }
    }

    out
  }
}

fn aliases(names: &[String]) -> String {
  if names.is_empty() {
    String::new()
  } else {
    format!(" ({})", names.join(", "))
  }
}
