//! Keyset predicate construction.
//!
//! Given the caller's filter, the resolved sort order and an optional cursor,
//! [`build_predicate`] produces the filter that resumes iteration strictly
//! after the cursor's document:
//!
//! ```text
//! ascending:  (f > v) OR (f == v AND id > last_id) OR (f in a later type bracket)
//! descending: (f < v) OR (f == v AND id < last_id) OR (f in an earlier type bracket)
//!             OR (f missing)
//! ```
//!
//! Range comparisons never match across type brackets, while the store's
//! sort order places whole brackets after one another. The bracket clauses
//! keep documents whose sort value sorts after the cursor in another
//! bracket reachable. Missing values sort with null, first in ascending
//! order and so only reachable after a cursor when descending.
//!
//! The caller's filter is never inspected. It is combined with the keyset
//! clause as one operand of an explicit `And`, so fields referenced by both
//! can never overwrite each other.

use bson::Bson;

use crate::{
    backend::IdKind,
    cursor::Cursor,
    error::{PaginationError, PaginationResult},
    query::{Expr, FieldOp, Sort, SortDirection, SortSpec},
    value::{TypeBracket, TypeClass, type_name},
};

/// The total order of a paginated request: one primary key plus the tiebreak.
#[derive(Debug, Clone, PartialEq)]
pub struct SortPlan {
    pub primary: String,
    pub direction: SortDirection,
    pub tiebreak: String,
}

impl SortPlan {
    /// Resolves a caller sort spec against the store's tiebreak field.
    ///
    /// Only the first entry takes part in the keyset. Later entries other
    /// than the tiebreak itself are ignored.
    pub fn resolve(spec: &SortSpec, tiebreak: &str) -> PaginationResult<SortPlan> {
        let (first, rest) = spec
            .fields()
            .split_first()
            .ok_or(PaginationError::MissingSortSpec)?;

        let ignored = rest
            .iter()
            .filter(|sort| sort.field != tiebreak)
            .map(|sort| sort.field.as_str())
            .collect::<Vec<_>>();
        if !ignored.is_empty() {
            tracing::warn!(
                primary = %first.field,
                ?ignored,
                "secondary sort fields are ignored; ordering uses the primary field and the tiebreak"
            );
        }

        Ok(SortPlan {
            primary: first.field.clone(),
            direction: first.direction,
            tiebreak: tiebreak.to_string(),
        })
    }

    /// True when the caller sorts by the tiebreak field itself.
    pub fn is_tiebreak_only(&self) -> bool {
        self.primary == self.tiebreak
    }

    /// The store sort keys: primary first, then the tiebreak in the same direction.
    pub fn sorts(&self) -> Vec<Sort> {
        let mut sorts = vec![Sort::new(self.primary.clone(), self.direction)];
        if !self.is_tiebreak_only() {
            sorts.push(Sort::new(self.tiebreak.clone(), self.direction));
        }
        sorts
    }

    fn after_op(&self) -> FieldOp {
        match self.direction {
            SortDirection::Asc => FieldOp::Gt,
            SortDirection::Desc => FieldOp::Lt,
        }
    }
}

/// Builds the predicate for one page.
///
/// Without a cursor the base filter is returned unchanged (`None` means
/// "match everything").
pub fn build_predicate(
    base: Option<Expr>,
    plan: &SortPlan,
    cursor: Option<&Cursor>,
    id_kind: IdKind,
) -> PaginationResult<Option<Expr>> {
    let Some(cursor) = cursor else {
        return Ok(base);
    };

    let position = cursor.decode(id_kind)?;
    let op = plan.after_op();

    let clause = if plan.is_tiebreak_only() {
        Expr::field(plan.tiebreak.clone(), op, position.id)
    } else {
        ensure_orderable(&plan.primary, &position.value)?;
        let bracket = TypeBracket::of(&position.value);

        let mut clauses = vec![
            Expr::field(plan.primary.clone(), op, position.value.clone()),
            Expr::And(vec![
                Expr::field(plan.primary.clone(), FieldOp::Eq, position.value),
                Expr::field(plan.tiebreak.clone(), op, position.id),
            ]),
        ];

        let later = match plan.direction {
            SortDirection::Asc => bracket.after(),
            SortDirection::Desc => bracket.before(),
        };
        if !later.is_empty() {
            clauses.push(Expr::Type(plan.primary.clone(), later));
        }
        if plan.direction == SortDirection::Desc {
            clauses.push(Expr::Exists(plan.primary.clone(), false));
        }

        Expr::Or(clauses)
    };

    Ok(Some(match base {
        Some(base) => Expr::And(vec![base, clause]),
        None => clause,
    }))
}

/// Rejects sort values the generated comparisons cannot order.
pub(crate) fn ensure_orderable(field: &str, value: &Bson) -> PaginationResult<TypeClass> {
    TypeClass::of(value).ok_or_else(|| PaginationError::IncompatibleSortValue {
        field: field.to_string(),
        reason: format!("{} values cannot be used as a keyset position", type_name(value)),
    })
}
