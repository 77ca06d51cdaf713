//! Query construction for document stores.
//!
//! A [`Query`] is the single request shape a [`StoreBackend`](crate::backend::StoreBackend)
//! has to understand: an optional filter expression, a multi-key sort, an
//! optional projection and an optional limit. Backends translate the filter
//! tree with a [`QueryVisitor`].
//!
//! ```ignore
//! use keypage::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "active").and(Filter::gt("age", 18)))
//!     .sort("created_at", SortDirection::Desc)
//!     .sort("_id", SortDirection::Desc)
//!     .limit(21)
//!     .build();
//! ```

use bson::{Bson, Document};
use serde_json::Value;

use crate::{
    error::{DocumentStoreError, PaginationError, PaginationResult},
    value::{TypeBracket, get_path, remove_path, set_path},
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Parses a caller supplied direction for `field`.
    ///
    /// Accepts `1`, `-1`, `"asc"`, `"ascending"`, `"desc"` and `"descending"`
    /// (case-insensitive).
    pub fn from_json(field: &str, raw: &Value) -> PaginationResult<SortDirection> {
        let parsed = match raw {
            Value::Number(number) => match number.as_i64() {
                Some(1) => Some(SortDirection::Asc),
                Some(-1) => Some(SortDirection::Desc),
                _ => None,
            },
            Value::String(text) => match text.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Some(SortDirection::Asc),
                "desc" | "descending" => Some(SortDirection::Desc),
                _ => None,
            },
            _ => None,
        };

        parsed.ok_or_else(|| PaginationError::InvalidSortDirection {
            field: field.to_string(),
            direction: raw.to_string(),
        })
    }

    /// The native MongoDB sort value (`1` or `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key: a (possibly dotted) field name and its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// An ordered mapping from field name to direction, as supplied by a caller.
///
/// The first entry is the primary sort field of a paginated request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    fields: Vec<Sort>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key. Keys keep their insertion order.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.fields.push(Sort::new(field, direction));
        self
    }

    /// Parses a JSON object such as `{"date": -1, "_id": "asc"}`.
    ///
    /// Key order is significant, so the JSON object must preserve insertion order.
    pub fn from_json(raw: &Value) -> PaginationResult<SortSpec> {
        match raw {
            Value::Null => Ok(SortSpec::new()),
            Value::Object(map) => map
                .iter()
                .map(|(field, direction)| {
                    SortDirection::from_json(field, direction).map(|direction| Sort::new(field.clone(), direction))
                })
                .collect::<PaginationResult<Vec<_>>>()
                .map(|fields| SortSpec { fields }),
            other => Err(PaginationError::InvalidArguments(format!(
                "sort must be an object mapping field names to directions, got {other}"
            ))),
        }
    }

    pub fn fields(&self) -> &[Sort] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<Sort>> for SortSpec {
    fn from(fields: Vec<Sort>) -> Self {
        Self { fields }
    }
}

/// Field selection applied to fetched documents.
///
/// Entries are `(path, include)` pairs. A projection is either an inclusion
/// (only the listed paths plus `_id` are returned) or an exclusion (everything
/// except the listed paths). The only entry allowed to disagree with the rest
/// is `_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<(String, bool)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.set(path.into(), true);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.set(path.into(), false);
        self
    }

    /// Parses a JSON object such as `{"title": 1, "body": 0}`.
    pub fn from_json(raw: &Value) -> Result<Projection, String> {
        let Value::Object(map) = raw else {
            return Err(format!("projection must be an object, got {raw}"));
        };

        let mut projection = Projection::new();
        for (path, flag) in map {
            let include = match flag {
                Value::Bool(flag) => *flag,
                Value::Number(number) => match number.as_i64() {
                    Some(0) => false,
                    Some(1) => true,
                    _ => return Err(format!("projection value for '{path}' must be 0 or 1")),
                },
                _ => return Err(format!("projection value for '{path}' must be 0, 1 or a boolean")),
            };
            projection.set(path.clone(), include);
        }

        projection.validate()?;
        Ok(projection)
    }

    pub fn fields(&self) -> &[(String, bool)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when the projection lists the paths to keep.
    pub fn is_inclusion(&self) -> bool {
        let only_id = !self.fields.is_empty()
            && self.fields.iter().all(|(path, include)| path == "_id" && *include);

        only_id
            || self.fields
                .iter()
                .any(|(path, include)| *include && path != "_id")
    }

    /// Looks up the explicit flag of a path.
    pub fn flag(&self, path: &str) -> Option<bool> {
        self.fields
            .iter()
            .find(|(field, _)| field == path)
            .map(|(_, include)| *include)
    }

    /// Rejects projections mixing inclusion and exclusion outside `_id`.
    pub fn validate(&self) -> Result<(), String> {
        let mut non_id = self.fields.iter().filter(|(path, _)| path != "_id");

        match non_id.next() {
            Some((_, first)) if non_id.any(|(_, include)| include != first) => {
                Err("projection cannot mix inclusion and exclusion".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Widens the projection so every path in `required` is returned.
    ///
    /// Paths are matched by prefix: an included `meta` already returns
    /// `meta.score`, and an excluded `meta` hides it.
    pub fn require(&self, required: &[&str]) -> Projection {
        let mut widened = self.clone();

        if self.is_inclusion() {
            for path in required {
                let covered = widened
                    .fields
                    .iter()
                    .any(|(field, include)| *include && contains_path(field, path))
                    || (*path == "_id" && widened.flag("_id").is_none());

                if !covered {
                    widened.fields.retain(|(field, _)| !contains_path(path, field));
                    widened.set((*path).to_string(), true);
                }
            }
        } else {
            for path in required {
                widened
                    .fields
                    .retain(|(field, _)| !contains_path(field, path) && !contains_path(path, field));
            }
            // `_id: 1` alone would turn what is left into an inclusion.
            widened.fields.retain(|(_, include)| !include);
        }

        widened
    }

    /// Applies the projection to a full document.
    ///
    /// Inclusion projections keep `_id` unless it is excluded explicitly.
    pub fn apply(&self, document: &Document) -> Document {
        if !self.is_inclusion() {
            let mut projected = document.clone();
            for (path, _) in self.fields.iter().filter(|(_, include)| !include) {
                remove_path(&mut projected, path);
            }
            return projected;
        }

        let mut projected = Document::new();
        if self.flag("_id") != Some(false) {
            if let Some(id) = document.get("_id") {
                projected.insert("_id", id.clone());
            }
        }

        for (path, include) in &self.fields {
            if *include && path != "_id" {
                if let Some(value) = get_path(document, path) {
                    set_path(&mut projected, path, value.clone());
                }
            }
        }

        projected
    }

    fn set(&mut self, path: String, include: bool) {
        match self.fields.iter_mut().find(|(field, _)| *field == path) {
            Some(entry) => entry.1 = include,
            None => self.fields.push((path, include)),
        }
    }
}

/// True when `path` is `ancestor` itself or lies below it.
fn contains_path(ancestor: &str, path: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// The field equals one of the values of an array operand.
    In,
    /// The field equals none of the values of an array operand.
    NotIn,
}

/// A filter expression tree.
///
/// The pagination core never looks inside a caller's expression; it only
/// combines it with its own clauses through [`Expr::And`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All must match.
    And(Vec<Expr>),
    /// Any must match.
    Or(Vec<Expr>),
    /// Inverts the result.
    Not(Box<Expr>),
    /// The field exists (`true`) or is missing (`false`).
    Exists(String, bool),
    /// The field holds a value, or an array element, of one of the brackets.
    Type(String, Vec<TypeBracket>),
    /// Field comparison.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND, flattening
    /// into an existing AND list.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR, flattening
    /// into an existing OR list.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query for retrieving documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys in priority order.
    pub sort: Vec<Sort>,
    /// Optional field selection.
    pub projection: Option<Projection>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Shorthands for building filter expressions.
///
/// ```ignore
/// let expr = Filter::eq("name", "Alice").and(Filter::gte("age", 18));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents whose field equals any of `values`.
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents whose field equals none of `values`.
    pub fn not_in(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NotIn,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn of_type(field: impl Into<String>, brackets: impl IntoIterator<Item = TypeBracket>) -> Expr {
        Expr::Type(field.into(), brackets.into_iter().collect())
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter when one is given, leaving the query unfiltered otherwise.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Appends a sort key; earlier keys take priority.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    pub fn projection(mut self, projection: Option<Projection>) -> Self {
        self.query.projection = projection.filter(|projection| !projection.is_empty());
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression tree, producing a backend specific output.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_type(
        &mut self,
        field: &str,
        brackets: &[TypeBracket],
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
            Expr::Type(field, brackets) => self.visit_type(field, brackets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_spec_keeps_key_order() {
        let spec = SortSpec::from_json(&json!({ "zeta": -1, "alpha": "asc" })).unwrap();

        assert_eq!(
            spec.fields(),
            &[Sort::new("zeta", SortDirection::Desc), Sort::new("alpha", SortDirection::Asc)]
        );
    }

    #[test]
    fn unknown_directions_are_rejected() {
        for raw in [json!(0), json!(2), json!("up"), json!(true), json!(null)] {
            let err = SortSpec::from_json(&json!({ "date": raw })).unwrap_err();
            assert_eq!(err.kind(), "InvalidSortDirection");
        }
    }

    #[test]
    fn projection_rejects_mixed_modes() {
        assert!(Projection::from_json(&json!({ "a": 1, "b": 0 })).is_err());
        assert!(Projection::from_json(&json!({ "a": 1, "_id": 0 })).is_ok());
        assert!(Projection::from_json(&json!({ "a": 2 })).is_err());
    }

    #[test]
    fn require_widens_inclusion_projections() {
        let projection = Projection::new().include("title");
        let widened = projection.require(&["date", "_id"]);

        assert_eq!(widened.flag("date"), Some(true));
        assert_eq!(widened.flag("_id"), None);
        assert_eq!(widened.fields().len(), 2);
    }

    #[test]
    fn require_narrows_exclusion_projections() {
        let projection = Projection::new().exclude("date").exclude("_id").exclude("body");
        let widened = projection.require(&["date", "_id"]);

        assert_eq!(widened.fields(), &[("body".to_string(), false)]);
    }

    #[test]
    fn require_respects_parent_paths() {
        let included = Projection::new().include("meta");
        assert_eq!(included.require(&["meta.score", "_id"]), included);

        let nested = Projection::new().include("meta.tag").include("meta.score.raw");
        assert_eq!(
            nested.require(&["meta.score"]).fields(),
            &[("meta.tag".to_string(), true), ("meta.score".to_string(), true)]
        );

        let excluded = Projection::new().exclude("meta").exclude("body");
        assert_eq!(excluded.require(&["meta.score"]).fields(), &[("body".to_string(), false)]);

        // a sibling sharing a name prefix is not a parent
        let sibling = Projection::new().include("metadata");
        assert_eq!(sibling.require(&["meta"]).flag("meta"), Some(true));
    }

    #[test]
    fn apply_keeps_included_paths_and_id() {
        let document = bson::doc! { "_id": 1, "title": "t", "meta": { "score": 3, "tag": "x" } };

        assert_eq!(
            Projection::new().include("meta.score").apply(&document),
            bson::doc! { "_id": 1, "meta": { "score": 3 } }
        );
        assert_eq!(
            Projection::new().include("title").exclude("_id").apply(&document),
            bson::doc! { "title": "t" }
        );
        assert_eq!(
            Projection::new().exclude("meta.tag").exclude("_id").apply(&document),
            bson::doc! { "title": "t", "meta": { "score": 3 } }
        );
    }
}
