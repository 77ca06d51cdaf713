//! Query expression evaluation for in-memory document filtering and sorting.
//!
//! Values are compared the way MongoDB compares them. Sorting uses a total
//! order across types (null and missing first, then numbers, strings,
//! documents, arrays, binary data, object ids, booleans and dates), while
//! range filters (`$gt`, `$lt`, ...) only match values of the same type
//! bracket as the operand.

use std::cmp::Ordering;

use bson::{Bson, DateTime, Document};

use keypage_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
    value::{TypeBracket, get_path},
};

/// Borrowed, comparable view of a BSON value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Comparable<'a> {
    /// Null, undefined and missing fields.
    Null,
    Int(i64),
    Double(f64),
    String(&'a str),
    Document(&'a Document),
    Array(&'a [Bson]),
    /// Binary data, UUIDs included, compared by length, subtype, then bytes.
    Binary(u8, &'a [u8]),
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(DateTime),
    /// Types without a defined order (regexes, code, timestamps, ...).
    Other(u8),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Document(document) => Comparable::Document(document),
            Bson::Array(array) => Comparable::Array(array),
            Bson::Binary(binary) => Comparable::Binary(u8::from(binary.subtype), &binary.bytes),
            Bson::ObjectId(oid) => Comparable::ObjectId(oid.bytes()),
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            other => Comparable::Other(other.element_type() as u8),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Type bracket; values of lower brackets sort first.
    fn bracket(&self) -> TypeBracket {
        match self {
            Comparable::Null => TypeBracket::Null,
            Comparable::Int(_) | Comparable::Double(_) => TypeBracket::Number,
            Comparable::String(_) => TypeBracket::String,
            Comparable::Document(_) => TypeBracket::Document,
            Comparable::Array(_) => TypeBracket::Array,
            Comparable::Binary(..) => TypeBracket::Binary,
            Comparable::ObjectId(_) => TypeBracket::ObjectId,
            Comparable::Bool(_) => TypeBracket::Boolean,
            Comparable::DateTime(_) => TypeBracket::Date,
            Comparable::Other(_) => TypeBracket::Other,
        }
    }

    /// Total order across all values, used for sorting.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.bracket()
            .cmp(&other.bracket())
            .then_with(|| self.cmp_within_bracket(other))
    }

    /// Order within one type bracket; `None` for values of different brackets.
    pub fn bracket_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.bracket() == other.bracket()).then(|| self.cmp_within_bracket(other))
    }

    fn cmp_within_bracket(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Int(a), Comparable::Int(b)) => a.cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => (*a as f64).total_cmp(b),
            (Comparable::Double(a), Comparable::Int(b)) => a.total_cmp(&(*b as f64)),
            (Comparable::Double(a), Comparable::Double(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Document(a), Comparable::Document(b)) => cmp_documents(a, b),
            (Comparable::Array(a), Comparable::Array(b)) => cmp_arrays(a, b),
            (Comparable::Binary(sa, a), Comparable::Binary(sb, b)) => a
                .len()
                .cmp(&b.len())
                .then(sa.cmp(sb))
                .then_with(|| a.cmp(b)),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::Other(a), Comparable::Other(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.bracket_cmp(other) == Some(Ordering::Equal)
    }
}

fn cmp_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ordering = Comparable::from(va)
            .bracket()
            .cmp(&Comparable::from(vb).bracket())
            .then_with(|| ka.cmp(kb))
            .then_with(|| Comparable::from(va).total_cmp(&Comparable::from(vb)));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.len().cmp(&b.len())
}

fn cmp_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (va, vb) in a.iter().zip(b.iter()) {
        let ordering = Comparable::from(va).total_cmp(&Comparable::from(vb));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.len().cmp(&b.len())
}

/// Compares two documents by a multi-key sort; missing fields sort as null.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = get_path(a, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = get_path(b, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.total_cmp(&right),
            SortDirection::Desc => right.total_cmp(&left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns whether `candidate`, or any element of it when it is an array,
    /// satisfies `test`.
    fn any_value<'v>(candidate: &'v Bson, test: impl Fn(Comparable<'v>) -> bool) -> bool {
        match candidate {
            Bson::Array(items) => {
                test(Comparable::from(candidate)) || items.iter().any(|item| test(Comparable::from(item)))
            }
            _ => test(Comparable::from(candidate)),
        }
    }

    fn matches_eq(field_value: Option<&Bson>, operand: &Bson) -> bool {
        let operand = Comparable::from(operand);
        match field_value {
            Some(value) => Self::any_value(value, |candidate| candidate == operand),
            None => matches!(operand, Comparable::Null),
        }
    }

    fn matches_in(field_value: Option<&Bson>, operand: &Bson) -> DocumentStoreResult<bool> {
        let Bson::Array(values) = operand else {
            return Err(DocumentStoreError::InvalidQuery(
                "$in and $nin require an array operand".to_string(),
            ));
        };

        Ok(values
            .iter()
            .any(|value| Self::matches_eq(field_value, value)))
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some() == should_exist)
    }

    fn visit_type(&mut self, field: &str, brackets: &[TypeBracket]) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some_and(|value| {
            Self::any_value(value, |candidate| brackets.contains(&candidate.bracket()))
        }))
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = get_path(self.document, field);

        match op {
            FieldOp::Eq => Ok(Self::matches_eq(field_value, value)),
            FieldOp::Ne => Ok(!Self::matches_eq(field_value, value)),
            FieldOp::In => Self::matches_in(field_value, value),
            FieldOp::NotIn => Ok(!Self::matches_in(field_value, value)?),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let Some(field_value) = field_value else {
                    return Ok(false);
                };
                let operand = Comparable::from(value);

                Ok(Self::any_value(field_value, |candidate| {
                    match candidate.bracket_cmp(&operand) {
                        Some(ordering) => match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }))
            }
        }
    }
}
