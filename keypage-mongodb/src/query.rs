//! Query translation from keypage expressions to MongoDB query syntax.

use bson::{Bson, Document, doc};

use keypage_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, Projection, QueryVisitor, Sort},
    value::TypeBracket,
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    fn translate_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$and": self.translate_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$or": self.translate_all(exprs)? })
    }

    // MongoDB has no top-level $not; $nor with one operand inverts it.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let inner = self.visit_expr(expr)?;
        Ok(doc! { "$nor": [inner] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_type(&mut self, field: &str, brackets: &[TypeBracket]) -> Result<Self::Output, Self::Error> {
        let aliases = brackets
            .iter()
            .flat_map(|bracket| type_aliases(*bracket))
            .map(|alias| Bson::String(alias.to_string()))
            .collect::<Vec<_>>();

        Ok(doc! { field: { "$type": aliases } })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let operator = match op {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::In | FieldOp::NotIn => {
                if !matches!(value, Bson::Array(_)) {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "field '{field}': $in and $nin require an array operand"
                    )));
                }
                if op == FieldOp::In { "$in" } else { "$nin" }
            }
        };

        Ok(doc! { field: { operator: value.clone() } })
    }
}

/// `$type` aliases of the BSON types sorting in one bracket.
fn type_aliases(bracket: TypeBracket) -> &'static [&'static str] {
    match bracket {
        TypeBracket::Null => &["null", "undefined"],
        TypeBracket::Number => &["number"],
        TypeBracket::String => &["string", "symbol"],
        TypeBracket::Document => &["object"],
        TypeBracket::Array => &["array"],
        TypeBracket::Binary => &["binData"],
        TypeBracket::ObjectId => &["objectId"],
        TypeBracket::Boolean => &["bool"],
        TypeBracket::Date => &["date"],
        TypeBracket::Other => &["timestamp", "regex", "javascript", "javascriptWithScope", "dbPointer", "minKey", "maxKey"],
    }
}

/// Builds a `find` sort document; key order is sort priority.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

pub(crate) fn projection_document(projection: &Projection) -> Document {
    projection
        .fields()
        .iter()
        .map(|(path, include)| (path.clone(), Bson::Int32(i32::from(*include))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypage_core::query::{Filter, SortDirection};

    fn translate(expr: &Expr) -> Document {
        MongoQueryTranslator.visit_expr(expr).unwrap()
    }

    #[test]
    fn keyset_clauses_translate_to_nested_operators() {
        let expr = Filter::and([
            Filter::eq("status", "open"),
            Filter::or([
                Filter::gt("date", 5),
                Filter::and([Filter::eq("date", 5), Filter::gt("_id", "b")]),
            ]),
        ]);

        assert_eq!(
            translate(&expr),
            doc! {
                "$and": [
                    { "status": { "$eq": "open" } },
                    { "$or": [
                        { "date": { "$gt": 5 } },
                        { "$and": [{ "date": { "$eq": 5 } }, { "_id": { "$gt": "b" } }] }
                    ] }
                ]
            }
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            translate(&Filter::exists("deleted").not()),
            doc! { "$nor": [{ "deleted": { "$exists": true } }] }
        );
    }

    #[test]
    fn type_brackets_expand_to_aliases() {
        assert_eq!(
            translate(&Filter::of_type("v", TypeBracket::Number.before())),
            doc! { "v": { "$type": ["null", "undefined"] } }
        );
        assert_eq!(
            translate(&Filter::of_type("v", [TypeBracket::String, TypeBracket::Date])),
            doc! { "v": { "$type": ["string", "symbol", "date"] } }
        );
    }

    #[test]
    fn membership_operators_require_arrays() {
        assert_eq!(
            translate(&Filter::not_in("tag", ["a", "b"])),
            doc! { "tag": { "$nin": ["a", "b"] } }
        );

        let expr = Expr::field("tag".to_string(), FieldOp::In, Bson::String("a".into()));
        assert!(MongoQueryTranslator.visit_expr(&expr).is_err());
    }

    #[test]
    fn sort_and_projection_documents_keep_key_order() {
        let sort = [Sort::new("date", SortDirection::Desc), Sort::new("_id", SortDirection::Desc)];
        assert_eq!(sort_document(&sort), doc! { "date": -1, "_id": -1 });

        let projection = Projection::new().include("title").include("date");
        assert_eq!(projection_document(&projection), doc! { "title": 1, "date": 1 });
    }
}
