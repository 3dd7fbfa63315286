//! Chunk search filters and their SQL translation.
//!
//! A filter is `{field, op, value}`. Recognised fields are
//! `document_id`, `source`, `created_at`, and `meta.<key>`; recognised
//! ops are `eq`, `in`, `gt`, `lt`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field a filter predicate applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterField {
    DocumentId,
    Source,
    CreatedAt,
    /// A key inside the chunk's JSON metadata (`meta.<key>`).
    Meta(String),
}

impl FilterField {
    /// Parse a field name as it appears in filter payloads.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document_id" => Some(FilterField::DocumentId),
            "source" => Some(FilterField::Source),
            "created_at" => Some(FilterField::CreatedAt),
            other => other
                .strip_prefix("meta.")
                .filter(|k| !k.is_empty())
                .map(|k| FilterField::Meta(k.to_string())),
        }
    }

    /// SQL expression selecting this field, with chunks aliased `c` and
    /// documents aliased `d`.
    fn sql_expr(&self) -> String {
        match self {
            FilterField::DocumentId => "c.document_id".to_string(),
            FilterField::Source => "d.source".to_string(),
            FilterField::CreatedAt => "c.created_at".to_string(),
            FilterField::Meta(key) => format!("json_extract(c.meta, '$.{}')", sanitize_key(key)),
        }
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    In,
    Gt,
    Lt,
}

/// A single filter predicate over chunk rows.
#[derive(Clone, Debug)]
pub struct ChunkFilter {
    pub field: FilterField,
    pub op: FilterOp,
    pub value: Value,
}

impl ChunkFilter {
    pub fn eq(field: FilterField, value: impl Into<Value>) -> Self {
        ChunkFilter {
            field,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn new(field: FilterField, op: FilterOp, value: impl Into<Value>) -> Self {
        ChunkFilter {
            field,
            op,
            value: value.into(),
        }
    }
}

/// Render filters into a SQL fragment and its bind values.
///
/// Returns `("AND <expr> ... ", binds)`; empty filters yield an empty
/// fragment. All values are bound as text — SQLite compares numerics in
/// TEXT-affinity columns after its usual coercions, and timestamps are
/// stored RFC 3339 so lexicographic order equals chronological order.
pub fn render_filters(filters: &[ChunkFilter]) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut binds = Vec::new();

    for filter in filters {
        let expr = filter.field.sql_expr();
        match filter.op {
            FilterOp::Eq => {
                sql.push_str(&format!(" AND {expr} = ?"));
                binds.push(value_to_text(&filter.value));
            }
            FilterOp::Gt => {
                sql.push_str(&format!(" AND {expr} > ?"));
                binds.push(value_to_text(&filter.value));
            }
            FilterOp::Lt => {
                sql.push_str(&format!(" AND {expr} < ?"));
                binds.push(value_to_text(&filter.value));
            }
            FilterOp::In => {
                let items: Vec<&Value> = match &filter.value {
                    Value::Array(items) => items.iter().collect(),
                    single => vec![single],
                };
                if items.is_empty() {
                    // IN () matches nothing.
                    sql.push_str(" AND 1 = 0");
                    continue;
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                sql.push_str(&format!(" AND {expr} IN ({placeholders})"));
                binds.extend(items.iter().map(|v| value_to_text(v)));
            }
        }
    }

    (sql, binds)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keep metadata keys to a safe identifier subset before splicing them
/// into a json_extract path.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
