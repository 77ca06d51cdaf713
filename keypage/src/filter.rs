//! MongoDB-style JSON filters.
//!
//! Parses the filter documents callers send over JSON into [`Expr`] trees:
//!
//! ```json
//! { "status": "open", "date": { "$gte": { "$date": "2024-01-01T00:00:00Z" } },
//!   "$or": [ { "priority": { "$in": [1, 2] } }, { "owner": { "$exists": false } } ] }
//! ```
//!
//! Supported operators: `$and`, `$or`, `$nor` at the top level; `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists` and `$not` on
//! fields. Values use extended JSON, so `{"$date": ...}` and `{"$oid": ...}`
//! compare as dates and object ids.

use serde_json::{Map, Value};

use keypage_core::{
    error::{PaginationError, PaginationResult},
    query::{Expr, FieldOp},
    value::{from_json, is_type_wrapper},
};

fn invalid(message: impl Into<String>) -> PaginationError {
    PaginationError::InvalidArguments(message.into())
}

/// Parses a JSON filter. `null` and `{}` match every document.
pub fn parse_filter(raw: &Value) -> PaginationResult<Option<Expr>> {
    match raw {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => parse_document(map).map(Some),
        other => Err(invalid(format!("filter must be an object, got {other}"))),
    }
}

fn parse_document(map: &Map<String, Value>) -> PaginationResult<Expr> {
    let mut clauses = Vec::with_capacity(map.len());

    for (key, value) in map {
        let clause = match key.as_str() {
            "$and" => Expr::And(parse_list(key, value)?),
            "$or" => Expr::Or(parse_list(key, value)?),
            "$nor" => Expr::Or(parse_list(key, value)?).not(),
            operator if operator.starts_with('$') => {
                return Err(invalid(format!("unsupported top-level operator '{operator}'")));
            }
            field => parse_field(field, value)?,
        };
        clauses.push(clause);
    }

    Ok(conjunction(clauses))
}

fn parse_list(operator: &str, value: &Value) -> PaginationResult<Vec<Expr>> {
    let Value::Array(items) = value else {
        return Err(invalid(format!("{operator} requires an array of filters")));
    };
    if items.is_empty() {
        return Err(invalid(format!("{operator} requires at least one filter")));
    }

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => parse_document(map),
            other => Err(invalid(format!("{operator} entries must be objects, got {other}"))),
        })
        .collect()
}

fn is_operator_document(map: &Map<String, Value>) -> bool {
    !map.is_empty() && !is_type_wrapper(map) && map.keys().all(|key| key.starts_with('$'))
}

fn parse_field(field: &str, value: &Value) -> PaginationResult<Expr> {
    match value {
        Value::Object(map) if is_operator_document(map) => parse_operators(field, map),
        literal => Ok(Expr::field(field.to_string(), FieldOp::Eq, to_bson(field, literal)?)),
    }
}

fn parse_operators(field: &str, map: &Map<String, Value>) -> PaginationResult<Expr> {
    let mut clauses = Vec::with_capacity(map.len());

    for (operator, operand) in map {
        let op = match operator.as_str() {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" | "$nin" => {
                if !operand.is_array() {
                    return Err(invalid(format!("{operator} on '{field}' requires an array")));
                }
                if operator == "$in" { FieldOp::In } else { FieldOp::NotIn }
            }
            "$exists" => {
                let Value::Bool(should_exist) = operand else {
                    return Err(invalid(format!("$exists on '{field}' requires a boolean")));
                };
                clauses.push(Expr::Exists(field.to_string(), *should_exist));
                continue;
            }
            "$not" => {
                let Value::Object(inner) = operand else {
                    return Err(invalid(format!("$not on '{field}' requires an operator object")));
                };
                if !is_operator_document(inner) {
                    return Err(invalid(format!("$not on '{field}' requires an operator object")));
                }
                clauses.push(parse_operators(field, inner)?.not());
                continue;
            }
            other => return Err(invalid(format!("unsupported operator '{other}' on '{field}'"))),
        };

        clauses.push(Expr::field(field.to_string(), op, to_bson(field, operand)?));
    }

    Ok(conjunction(clauses))
}

fn to_bson(field: &str, value: &Value) -> PaginationResult<bson::Bson> {
    from_json(value).map_err(|err| invalid(format!("invalid value for '{field}': {err}")))
}

fn conjunction(mut clauses: Vec<Expr>) -> Expr {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Expr::And(clauses)
    }
}
