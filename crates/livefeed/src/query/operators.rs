//! Mango selector evaluation.
//!
//! A field whose value is missing from the document only satisfies
//! `{"$exists": false}` (or a `$not` wrapping a condition it fails).

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{QueryError, Result};

// ============================================================================
// Value Comparison
// ============================================================================

/// Collation order between JSON values.
///
/// null < false < true < numbers < strings < arrays < objects. Arrays
/// compare element-wise, objects by their key/value pairs in order.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let fx = x.as_f64().unwrap_or(f64::NAN);
            let fy = y.as_f64().unwrap_or(f64::NAN);
            fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let c = collate(ex, ey);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let c = kx.cmp(ky).then_with(|| collate(vx, vy));
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Field Path Resolution
// ============================================================================

/// Get a nested value using a dot-separated path.
pub fn get_field_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// True for a non-empty object whose keys all start with `$`.
pub fn is_operator(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) if !obj.is_empty() => obj.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

// ============================================================================
// Selector Evaluation
// ============================================================================

/// Evaluates selectors, compiling each `$regex` pattern once.
///
/// Reuse one matcher across the documents of a query run.
#[derive(Debug, Default)]
pub struct SelectorMatcher {
    regexes: HashMap<String, Regex>,
}

impl SelectorMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a Mango selector against a document.
    ///
    /// A non-object selector matches everything; the empty selector `{}`
    /// matches everything.
    pub fn matches(&mut self, doc: &Value, selector: &Value) -> Result<bool> {
        let Some(obj) = selector.as_object() else {
            return Ok(true);
        };

        for (key, condition) in obj {
            let ok = match key.as_str() {
                "$and" => self.all_match(doc, condition)?,
                "$or" => self.any_match(doc, condition)?,
                "$nor" => !self.any_match(doc, condition)?,
                "$not" => !self.matches(doc, condition)?,
                k if k.starts_with('$') => {
                    return Err(QueryError::UnknownOperator(k.to_string()).into());
                }
                field => self.condition(get_field_value(doc, field), condition)?,
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn all_match(&mut self, doc: &Value, subs: &Value) -> Result<bool> {
        for sub in subs.as_array().map(Vec::as_slice).unwrap_or_default() {
            if !self.matches(doc, sub)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any_match(&mut self, doc: &Value, subs: &Value) -> Result<bool> {
        for sub in subs.as_array().map(Vec::as_slice).unwrap_or_default() {
            if self.matches(doc, sub)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Evaluate a field condition: an operator object or a direct value (`$eq`).
    fn condition(&mut self, value: Option<&Value>, condition: &Value) -> Result<bool> {
        match condition.as_object() {
            Some(ops) if is_operator(condition) => self.operators(value, ops),
            _ => self.operator(value, "$eq", condition),
        }
    }

    fn operators(&mut self, value: Option<&Value>, ops: &Map<String, Value>) -> Result<bool> {
        for (op, operand) in ops {
            if !self.operator(value, op, operand)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate one `$op: operand` pair against a (possibly missing) value.
    fn operator(&mut self, value: Option<&Value>, op: &str, operand: &Value) -> Result<bool> {
        if op == "$exists" {
            return Ok(operand.as_bool().unwrap_or(false) == value.is_some());
        }
        if op == "$not" {
            return Ok(!self.condition(value, operand)?);
        }

        let Some(v) = value else {
            return Ok(false);
        };

        match op {
            "$eq" => Ok(v == operand),
            "$ne" => Ok(v != operand),
            "$gt" => Ok(compare_op(value, operand, |o| o == Ordering::Greater)),
            "$gte" => Ok(compare_op(value, operand, |o| o != Ordering::Less)),
            "$lt" => Ok(compare_op(value, operand, |o| o == Ordering::Less)),
            "$lte" => Ok(compare_op(value, operand, |o| o != Ordering::Greater)),
            "$in" => Ok(operand
                .as_array()
                .map(|items| items.iter().any(|item| item == v))
                .unwrap_or(false)),
            "$nin" => Ok(operand
                .as_array()
                .map(|items| !items.iter().any(|item| item == v))
                .unwrap_or(true)),
            "$size" => Ok(match (v.as_array(), operand.as_u64()) {
                (Some(arr), Some(n)) => arr.len() as u64 == n,
                _ => false,
            }),
            "$all" => Ok(match (v.as_array(), operand.as_array()) {
                (Some(arr), Some(targets)) => targets.iter().all(|t| arr.contains(t)),
                _ => false,
            }),
            "$elemMatch" => match v.as_array() {
                Some(arr) => {
                    for elem in arr {
                        if self.condition(Some(elem), operand)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                None => Ok(false),
            },
            "$regex" => {
                let Some(pattern) = operand.as_str() else {
                    return Ok(false);
                };
                let re = self.regex(pattern)?;
                Ok(v.as_str().map(|text| re.is_match(text)).unwrap_or(false))
            }
            "$type" => Ok(operand.as_str() == Some(type_name(v))),
            "$mod" => {
                let Some([divisor, remainder]) = operand.as_array().map(Vec::as_slice) else {
                    return Ok(false);
                };
                match (v.as_i64(), divisor.as_i64(), remainder.as_i64()) {
                    // i64::MIN % -1 overflows; every integer is divisible by -1.
                    (Some(_), Some(-1), Some(r)) => Ok(r == 0),
                    (Some(n), Some(d), Some(r)) => Ok(n.checked_rem(d) == Some(r)),
                    _ => Ok(false),
                }
            }
            other => Err(QueryError::UnknownOperator(other.to_string()).into()),
        }
    }

    fn regex(&mut self, pattern: &str) -> Result<&Regex> {
        if !self.regexes.contains_key(pattern) {
            let re = Regex::new(pattern).map_err(|e| QueryError::InvalidRegex(e.to_string()))?;
            self.regexes.insert(pattern.to_string(), re);
        }
        self.regexes
            .get(pattern)
            .ok_or_else(|| QueryError::InvalidRegex(pattern.to_string()).into())
    }
}

fn compare_op(value: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    match value {
        Some(v) if type_rank(v) == type_rank(operand) => accept(collate(v, operand)),
        _ => false,
    }
}

/// Evaluate a Mango selector against a single document.
pub fn matches_selector(doc: &Value, selector: &Value) -> Result<bool> {
    SelectorMatcher::new().matches(doc, selector)
}

/// Documents that match `selector`, cloned, in input order.
pub fn filter_documents(docs: &[Value], selector: &Value) -> Result<Vec<Value>> {
    let mut matcher = SelectorMatcher::new();
    let mut out = Vec::new();
    for doc in docs {
        if matcher.matches(doc, selector)? {
            out.push(doc.clone());
        }
    }
    Ok(out)
}

// ============================================================================
// Tests (inline unit tests)
// ============================================================================
