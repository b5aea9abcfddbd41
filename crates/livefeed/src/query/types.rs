//! Live query type definitions: selector, sort and pagination.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

// ============================================================================
// Sort Types
// ============================================================================

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

/// Parse a Mango sort value into entries.
///
/// Accepted forms: `"field"`, `["a", "b"]`, `[{"a": "desc"}, "b"]`, and a
/// single `{"a": "asc"}` object.
pub fn parse_sort(sort: &Value) -> Result<Vec<SortEntry>> {
    match sort {
        Value::Null => Ok(Vec::new()),
        Value::String(field) => Ok(vec![SortEntry {
            field: field.clone(),
            direction: SortDirection::Asc,
        }]),
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                entries.extend(parse_sort(item)?);
            }
            Ok(entries)
        }
        Value::Object(obj) => obj.iter().map(|(k, v)| parse_entry(k, v)).collect(),
        other => Err(QueryError::InvalidSort(other.to_string()).into()),
    }
}

fn parse_entry(field: &str, direction: &Value) -> Result<SortEntry> {
    let direction = match direction.as_str() {
        Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        _ => {
            return Err(QueryError::InvalidSort(format!(
                "direction for \"{field}\" must be \"asc\" or \"desc\", got {direction}"
            ))
            .into())
        }
    };
    Ok(SortEntry {
        field: field.to_string(),
        direction,
    })
}

// ============================================================================
// LiveQuery
// ============================================================================

/// The query handed to `Database::live_find`.
///
/// `sort` is kept as the caller supplied it; the database parses it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveQuery {
    pub selector: Value,
    pub sort: Option<Value>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl LiveQuery {
    pub fn new(selector: Value) -> Self {
        Self {
            selector,
            ..Default::default()
        }
    }

    /// Match-everything selector (`{}`).
    pub fn all() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parsed sort entries (empty when no sort was given).
    pub fn sort_entries(&self) -> Result<Vec<SortEntry>> {
        match &self.sort {
            Some(sort) => parse_sort(sort),
            None => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
