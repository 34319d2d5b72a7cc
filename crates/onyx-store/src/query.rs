//! Read-only query execution over the store
//!
//! Supports the Cypher shapes consumers actually issue: single-node and
//! single-hop MATCH patterns with equality/CONTAINS filters, property
//! projection, `count(*)`, and LIMIT. Everything else is rejected with
//! `UnsupportedQuery` rather than mis-executed.

use onyx_core::{Entity, OnyxError, Relationship};

use crate::store::GraphStore;

/// Tabular query result: column names plus stringified rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    /// Tab-separated rendering, header first: the consumer-parsing form.
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CompareOp {
    Eq,
    Contains,
}

#[derive(Debug, Clone)]
struct Condition {
    var: String,
    prop: String,
    op: CompareOp,
    value: String,
}

#[derive(Debug, Clone)]
enum ReturnItem {
    CountStar,
    Prop { var: String, prop: String },
}

#[derive(Debug, Clone)]
enum Pattern {
    Node {
        var: String,
        label: Option<String>,
    },
    Hop {
        src_var: String,
        src_label: Option<String>,
        rel_var: String,
        rel_type: Option<String>,
        dst_var: String,
        dst_label: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct Query {
    pattern: Pattern,
    conditions: Vec<Condition>,
    returns: Vec<ReturnItem>,
    limit: Option<usize>,
}

/// Execute a query against the store.
pub fn execute(store: &GraphStore, text: &str) -> Result<QueryRows, OnyxError> {
    let query = parse(text)?;
    match &query.pattern {
        Pattern::Node { var, label } => run_node(store, &query, var, label.as_deref()),
        Pattern::Hop { .. } => run_hop(store, &query),
    }
}

fn unsupported(text: &str, why: &str) -> OnyxError {
    OnyxError::UnsupportedQuery(format!("{} in `{}`", why, text.trim()))
}

fn parse(text: &str) -> Result<Query, OnyxError> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = flat.to_lowercase();

    let match_at = lower
        .find("match ")
        .ok_or_else(|| unsupported(text, "missing MATCH"))?;
    let return_at = lower
        .rfind(" return ")
        .ok_or_else(|| unsupported(text, "missing RETURN"))?;

    let pattern_and_where = &flat[match_at + "match ".len()..return_at];
    let mut tail = &flat[return_at + " return ".len()..];

    let mut limit = None;
    if let Some(limit_at) = tail.to_lowercase().rfind(" limit ") {
        let raw = tail[limit_at + " limit ".len()..].trim();
        limit = Some(
            raw.parse::<usize>()
                .map_err(|_| unsupported(text, "malformed LIMIT"))?,
        );
        tail = &tail[..limit_at];
    }

    let (pattern_text, where_text) = match pattern_and_where.to_lowercase().find(" where ") {
        Some(at) => (
            &pattern_and_where[..at],
            Some(&pattern_and_where[at + " where ".len()..]),
        ),
        None => (pattern_and_where, None),
    };

    let pattern = parse_pattern(pattern_text.trim(), text)?;
    let conditions = match where_text {
        Some(w) => parse_conditions(w, text)?,
        None => Vec::new(),
    };
    let returns = parse_returns(tail.trim(), text)?;

    Ok(Query {
        pattern,
        conditions,
        returns,
        limit,
    })
}

/// `(n:Label)` or `(a:L1)-[r:TYPE]->(b:L2)`.
fn parse_pattern(pattern: &str, original: &str) -> Result<Pattern, OnyxError> {
    if let Some(arrow_at) = pattern.find("]->") {
        let bracket_at = pattern
            .find("-[")
            .ok_or_else(|| unsupported(original, "malformed hop pattern"))?;
        let src = parse_node_atom(&pattern[..bracket_at], original)?;
        let rel = &pattern[bracket_at + 2..arrow_at];
        let dst = parse_node_atom(&pattern[arrow_at + 3..], original)?;
        let (rel_var, rel_type) = split_var_label(rel);
        Ok(Pattern::Hop {
            src_var: src.0,
            src_label: src.1,
            rel_var,
            rel_type,
            dst_var: dst.0,
            dst_label: dst.1,
        })
    } else {
        let (var, label) = parse_node_atom(pattern, original)?;
        Ok(Pattern::Node { var, label })
    }
}

fn parse_node_atom(atom: &str, original: &str) -> Result<(String, Option<String>), OnyxError> {
    let inner = atom
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| unsupported(original, "malformed node pattern"))?;
    Ok(split_var_label(inner))
}

fn split_var_label(inner: &str) -> (String, Option<String>) {
    match inner.split_once(':') {
        Some((var, label)) => (var.trim().to_string(), Some(label.trim().to_string())),
        None => (inner.trim().to_string(), None),
    }
}

fn parse_conditions(where_text: &str, original: &str) -> Result<Vec<Condition>, OnyxError> {
    let mut conditions = Vec::new();
    for clause in split_case_insensitive(where_text, " and ") {
        let clause = clause.trim();
        let (lhs, op, rhs) = if let Some((l, r)) = split_once_case_insensitive(clause, " contains ")
        {
            (l, CompareOp::Contains, r)
        } else if let Some((l, r)) = clause.split_once('=') {
            (l, CompareOp::Eq, r)
        } else {
            return Err(unsupported(original, "unparseable WHERE clause"));
        };

        let (var, prop) = lhs
            .trim()
            .split_once('.')
            .ok_or_else(|| unsupported(original, "WHERE needs var.prop"))?;
        let value = rhs.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        conditions.push(Condition {
            var: var.trim().to_string(),
            prop: prop.trim().to_string(),
            op,
            value: value.to_string(),
        });
    }
    Ok(conditions)
}

fn parse_returns(returns_text: &str, original: &str) -> Result<Vec<ReturnItem>, OnyxError> {
    let mut items = Vec::new();
    for item in returns_text.split(',') {
        let item = item.trim();
        if item.eq_ignore_ascii_case("count(*)") {
            items.push(ReturnItem::CountStar);
        } else if let Some((var, prop)) = item.split_once('.') {
            items.push(ReturnItem::Prop {
                var: var.trim().to_string(),
                prop: prop.trim().to_string(),
            });
        } else {
            return Err(unsupported(original, "RETURN items must be var.prop or count(*)"));
        }
    }
    if items.is_empty() {
        return Err(unsupported(original, "empty RETURN"));
    }
    Ok(items)
}

fn split_case_insensitive<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let lower = text.to_lowercase();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut search = 0;
    while let Some(at) = lower[search..].find(sep) {
        let abs = search + at;
        parts.push(&text[start..abs]);
        start = abs + sep.len();
        search = start;
    }
    parts.push(&text[start..]);
    parts
}

fn split_once_case_insensitive<'a>(text: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let at = text.to_lowercase().find(sep)?;
    Some((&text[..at], &text[at + sep.len()..]))
}

fn run_node(
    store: &GraphStore,
    query: &Query,
    var: &str,
    label: Option<&str>,
) -> Result<QueryRows, OnyxError> {
    let mut matched: Vec<&Entity> = store
        .all_entities()
        .filter(|e| label.is_none_or(|l| e.kind.table_name() == l))
        .filter(|e| {
            query.conditions.iter().all(|c| {
                if c.var != var {
                    return false;
                }
                check(entity_field(e, &c.prop).as_deref(), c)
            })
        })
        .collect();
    matched.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    project(query, |item| match item {
        ReturnItem::CountStar => vec![matched.len().to_string()],
        ReturnItem::Prop { var: v, prop } => {
            if v == var {
                matched
                    .iter()
                    .map(|e| entity_field(e, prop).unwrap_or_default())
                    .collect()
            } else {
                matched.iter().map(|_| String::new()).collect()
            }
        }
    })
}

fn run_hop(store: &GraphStore, query: &Query) -> Result<QueryRows, OnyxError> {
    let Pattern::Hop {
        src_var,
        src_label,
        rel_var,
        rel_type,
        dst_var,
        dst_label,
    } = &query.pattern
    else {
        unreachable!("run_hop called with node pattern");
    };

    let mut matched: Vec<(&Entity, &Relationship, &Entity)> = store
        .all_relationships()
        .filter(|r| {
            rel_type
                .as_deref()
                .is_none_or(|t| r.rel_type.table_name() == t)
        })
        .filter_map(|r| {
            let src = store.get_entity(&r.source_id)?;
            let dst = store.get_entity(&r.target_id)?;
            Some((src, r, dst))
        })
        .filter(|(src, _, dst)| {
            src_label
                .as_deref()
                .is_none_or(|l| src.kind.table_name() == l)
                && dst_label
                    .as_deref()
                    .is_none_or(|l| dst.kind.table_name() == l)
        })
        .filter(|(src, rel, dst)| {
            query.conditions.iter().all(|c| {
                if c.var == *src_var {
                    check(entity_field(src, &c.prop).as_deref(), c)
                } else if c.var == *dst_var {
                    check(entity_field(dst, &c.prop).as_deref(), c)
                } else if c.var == *rel_var {
                    check(rel_field(rel, &c.prop).as_deref(), c)
                } else {
                    false
                }
            })
        })
        .collect();
    matched.sort_by(|a, b| a.1.id.cmp(&b.1.id));
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    project(query, |item| match item {
        ReturnItem::CountStar => vec![matched.len().to_string()],
        ReturnItem::Prop { var, prop } => matched
            .iter()
            .map(|(src, rel, dst)| {
                if var == src_var {
                    entity_field(src, prop).unwrap_or_default()
                } else if var == dst_var {
                    entity_field(dst, prop).unwrap_or_default()
                } else if var == rel_var {
                    rel_field(rel, prop).unwrap_or_default()
                } else {
                    String::new()
                }
            })
            .collect(),
    })
}

/// Assemble the column-major projections into row-major output.
fn project<F>(query: &Query, mut column_of: F) -> Result<QueryRows, OnyxError>
where
    F: FnMut(&ReturnItem) -> Vec<String>,
{
    let columns: Vec<String> = query
        .returns
        .iter()
        .map(|item| match item {
            ReturnItem::CountStar => "count(*)".to_string(),
            ReturnItem::Prop { var, prop } => format!("{}.{}", var, prop),
        })
        .collect();

    let materialized: Vec<Vec<String>> = query.returns.iter().map(&mut column_of).collect();
    let height = materialized.iter().map(Vec::len).max().unwrap_or(0);
    let rows = (0..height)
        .map(|i| {
            materialized
                .iter()
                .map(|col| col.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(QueryRows { columns, rows })
}

fn check(actual: Option<&str>, condition: &Condition) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    match condition.op {
        CompareOp::Eq => actual == condition.value,
        CompareOp::Contains => actual.contains(&condition.value),
    }
}

/// Shared-header columns plus the kind-specific property bag.
fn entity_field(entity: &Entity, prop: &str) -> Option<String> {
    match prop {
        "id" => Some(entity.id.clone()),
        "name" => Some(entity.name.clone()),
        "kind" | "label" => Some(entity.kind.table_name().to_string()),
        "file_path" => Some(entity.file_path.clone()),
        // The File table names its path column `path`.
        "path" => entity
            .property("path")
            .map(str::to_string)
            .or_else(|| Some(entity.file_path.clone())),
        "language" => Some(entity.language.as_str().to_string()),
        "signature" => Some(entity.signature.clone()),
        "body" => entity.body.clone(),
        "start_line" => Some(entity.span.start.to_string()),
        "end_line" => Some(entity.span.end.to_string()),
        "parent_id" => entity.parent_id.clone(),
        other => entity.property(other).map(str::to_string),
    }
}

fn rel_field(rel: &Relationship, prop: &str) -> Option<String> {
    match prop {
        "id" => Some(rel.id.clone()),
        "type" => Some(rel.rel_type.table_name().to_string()),
        "source_id" => Some(rel.source_id.clone()),
        "target_id" => Some(rel.target_id.clone()),
        other => rel.property(other).map(str::to_string),
    }
}
