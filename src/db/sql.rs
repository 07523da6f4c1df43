//! Dynamic SQL fragments built from optional inputs.
//!
//! Every fragment is paired with its bound values. Placeholders are numbered
//! (`$1`, `$2`, ...) and a placeholder's number is always the 1-based position
//! of its value in the returned list, so callers must bind values in order.

use serde::Deserialize;

use super::error::{DbError, DbResult};

/// A value bound to a numbered placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

/// Optional search filters for the property listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyFilter {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Case-insensitive substring of the title
    pub title_like: Option<String>,
}

/// A `WHERE` clause (possibly empty) and the values it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    pub clause: String,
    pub values: Vec<SqlValue>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }
}

impl PropertyFilter {
    /// Build the `WHERE` clause for this filter.
    ///
    /// Clauses are appended in the order min price, max price, title, and are
    /// joined with `AND`. No filters yields an empty clause.
    pub fn build(&self) -> DbResult<Predicate> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(DbError::BadRequest(
                    "Min price cannot be greater than max".to_string(),
                ));
            }
        }

        let mut parts: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(min) = self.min_price {
            values.push(SqlValue::Int(min));
            parts.push(format!("price >= ${}", values.len()));
        }

        if let Some(max) = self.max_price {
            values.push(SqlValue::Int(max));
            parts.push(format!("price <= ${}", values.len()));
        }

        if let Some(title) = self.title_like.as_deref() {
            if !title.is_empty() {
                values.push(SqlValue::Text(format!("%{}%", escape_like(title))));
                parts.push(format!("title LIKE ${} ESCAPE '\\'", values.len()));
            }
        }

        let clause = if parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", parts.join(" AND "))
        };

        Ok(Predicate { clause, values })
    }
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build a `SET` list for a partial update.
///
/// Returns e.g. `("title = $1, price = $2", [title, price])`. The caller binds
/// any trailing parameters (such as the row id) at `$values.len() + 1`.
pub fn partial_update(fields: Vec<(&'static str, SqlValue)>) -> DbResult<(String, Vec<SqlValue>)> {
    if fields.is_empty() {
        return Err(DbError::BadRequest("No data".to_string()));
    }

    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());

    for (column, value) in fields {
        values.push(value);
        columns.push(format!("{} = ${}", column, values.len()));
    }

    Ok((columns.join(", "), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(min: Option<i64>, max: Option<i64>, title: Option<&str>) -> PropertyFilter {
        PropertyFilter {
            min_price: min,
            max_price: max,
            title_like: title.map(str::to_string),
        }
    }

    #[test]
    fn test_no_filters_builds_empty_clause() {
        let predicate = PropertyFilter::default().build().unwrap();
        assert!(predicate.is_empty());
        assert!(predicate.values.is_empty());
    }

    #[test]
    fn test_all_filters_in_order() {
        let predicate = filter(Some(100), Some(300), Some("Oasis")).build().unwrap();
        assert_eq!(
            predicate.clause,
            "WHERE price >= $1 AND price <= $2 AND title LIKE $3 ESCAPE '\\'"
        );
        assert_eq!(
            predicate.values,
            vec![
                SqlValue::Int(100),
                SqlValue::Int(300),
                SqlValue::Text("%Oasis%".to_string()),
            ]
        );
    }

    #[test]
    fn test_placeholders_track_value_positions() {
        let predicate = filter(None, Some(50), Some("cabin")).build().unwrap();
        assert_eq!(
            predicate.clause,
            "WHERE price <= $1 AND title LIKE $2 ESCAPE '\\'"
        );
        assert_eq!(predicate.values[0], SqlValue::Int(50));

        let predicate = filter(Some(10), None, Some("cabin")).build().unwrap();
        assert_eq!(
            predicate.clause,
            "WHERE price >= $1 AND title LIKE $2 ESCAPE '\\'"
        );

        let predicate = filter(None, None, Some("cabin")).build().unwrap();
        assert_eq!(predicate.clause, "WHERE title LIKE $1 ESCAPE '\\'");

        let predicate = filter(Some(1), Some(2), None).build().unwrap();
        assert_eq!(predicate.clause, "WHERE price >= $1 AND price <= $2");
    }

    #[test]
    fn test_min_greater_than_max_is_rejected() {
        let err = filter(Some(100), Some(50), Some("anything")).build().unwrap_err();
        assert!(matches!(err, DbError::BadRequest(_)));
    }

    #[test]
    fn test_equal_bounds_are_allowed() {
        let predicate = filter(Some(75), Some(75), None).build().unwrap();
        assert_eq!(predicate.values.len(), 2);
    }

    #[test]
    fn test_empty_title_is_ignored() {
        let predicate = filter(None, None, Some("")).build().unwrap();
        assert!(predicate.is_empty());
    }

    #[test]
    fn test_title_whitespace_is_kept() {
        let predicate = filter(None, None, Some("Loft ")).build().unwrap();
        assert_eq!(predicate.values, vec![SqlValue::Text("%Loft %".to_string())]);
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        let predicate = filter(None, None, Some("100%_off\\")).build().unwrap();
        assert_eq!(
            predicate.values,
            vec![SqlValue::Text("%100\\%\\_off\\\\%".to_string())]
        );
    }

    #[test]
    fn test_filter_deserializes_camel_case() {
        let parsed: PropertyFilter =
            serde_json::from_str(r#"{"minPrice": 5, "titleLike": "loft"}"#).unwrap();
        assert_eq!(parsed, filter(Some(5), None, Some("loft")));

        let unknown = serde_json::from_str::<PropertyFilter>(r#"{"color": "red"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_partial_update_numbers_columns() {
        let (set, values) = partial_update(vec![
            ("title", SqlValue::Text("New".to_string())),
            ("price", SqlValue::Int(99)),
        ])
        .unwrap();
        assert_eq!(set, "title = $1, price = $2");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_partial_update_requires_data() {
        let err = partial_update(Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::BadRequest(_)));
    }
}
