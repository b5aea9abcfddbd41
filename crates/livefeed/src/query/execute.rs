//! Live query execution: filter, sort, then skip/limit.

use serde_json::Value;

use crate::error::Result;

use super::operators::{collate, filter_documents, get_field_value};
use super::types::{LiveQuery, SortDirection, SortEntry};

/// Sort documents by multiple fields with cascading priority.
///
/// Missing fields sort as `null`. The sort is stable, so documents that
/// compare equal keep their input order.
pub fn sort_documents(mut docs: Vec<Value>, sort: &[SortEntry]) -> Vec<Value> {
    if sort.is_empty() {
        return docs;
    }

    docs.sort_by(|a, b| {
        for entry in sort {
            let va = get_field_value(a, &entry.field).unwrap_or(&Value::Null);
            let vb = get_field_value(b, &entry.field).unwrap_or(&Value::Null);
            let cmp = collate(va, vb);
            if cmp != std::cmp::Ordering::Equal {
                return match entry.direction {
                    SortDirection::Desc => cmp.reverse(),
                    SortDirection::Asc => cmp,
                };
            }
        }
        std::cmp::Ordering::Equal
    });

    docs
}

/// Apply skip then limit.
pub fn paginate(docs: Vec<Value>, skip: Option<usize>, limit: Option<usize>) -> Vec<Value> {
    let iter = docs.into_iter().skip(skip.unwrap_or(0));
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

/// Evaluate a live query against a document set, producing the aggregate
/// result batch.
pub fn execute_live_query(docs: &[Value], query: &LiveQuery) -> Result<Vec<Value>> {
    let matched = filter_documents(docs, &query.selector)?;
    let sorted = sort_documents(matched, &query.sort_entries()?);
    Ok(paginate(sorted, query.skip, query.limit))
}
