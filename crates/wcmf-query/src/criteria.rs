//! Typed attribute conditions and their SQL rendering.
//!
//! A [`Criteria`] names a persistent type and one of its attributes. Turning
//! the attribute into a physical column is the caller's job (the mapper owns
//! that mapping); [`Criteria::render`] only needs the resolved table and
//! column.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wcmf_core::{Error, Value};

/// Comparison operator of a criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriteriaOperator {
    /// Equal (=)
    #[serde(rename = "=")]
    Eq,
    /// Not equal (!=)
    #[serde(rename = "!=")]
    Ne,
    /// Less than (<)
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    Le,
    /// Greater than (>)
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl CriteriaOperator {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            CriteriaOperator::Eq => "=",
            CriteriaOperator::Ne => "!=",
            CriteriaOperator::Lt => "<",
            CriteriaOperator::Le => "<=",
            CriteriaOperator::Gt => ">",
            CriteriaOperator::Ge => ">=",
            CriteriaOperator::Like => "LIKE",
            CriteriaOperator::In => "IN",
            CriteriaOperator::NotIn => "NOT IN",
            CriteriaOperator::IsNull => "IS NULL",
            CriteriaOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that take no right-hand value.
    pub const fn is_unary(self) -> bool {
        matches!(self, CriteriaOperator::IsNull | CriteriaOperator::IsNotNull)
    }
}

impl fmt::Display for CriteriaOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriteriaOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(CriteriaOperator::Eq),
            "!=" | "<>" => Ok(CriteriaOperator::Ne),
            "<" => Ok(CriteriaOperator::Lt),
            "<=" => Ok(CriteriaOperator::Le),
            ">" => Ok(CriteriaOperator::Gt),
            ">=" => Ok(CriteriaOperator::Ge),
            "LIKE" => Ok(CriteriaOperator::Like),
            "IN" => Ok(CriteriaOperator::In),
            "NOT IN" => Ok(CriteriaOperator::NotIn),
            "IS NULL" => Ok(CriteriaOperator::IsNull),
            "IS NOT NULL" => Ok(CriteriaOperator::IsNotNull),
            _ => Err(Error::illegal_argument(format!(
                "unknown criteria operator '{}'",
                s
            ))),
        }
    }
}

/// How a criteria joins the condition before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombineOperator {
    #[default]
    And,
    Or,
}

impl CombineOperator {
    pub const fn as_str(self) -> &'static str {
        match self {
            CombineOperator::And => "AND",
            CombineOperator::Or => "OR",
        }
    }
}

/// A condition on one attribute of a persistent type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Fully qualified or simple type name
    pub type_name: String,
    /// Attribute name (not the column)
    pub attribute: String,
    pub operator: CriteriaOperator,
    #[serde(default = "null_value")]
    pub value: Value,
    #[serde(default)]
    pub combine: CombineOperator,
}

fn null_value() -> Value {
    Value::Null
}

impl Criteria {
    /// Create a criteria combined with `AND`.
    pub fn new(
        type_name: impl Into<String>,
        attribute: impl Into<String>,
        operator: CriteriaOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            attribute: attribute.into(),
            operator,
            value: value.into(),
            combine: CombineOperator::And,
        }
    }

    /// Shorthand for an equality criteria.
    pub fn eq(
        type_name: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(type_name, attribute, CriteriaOperator::Eq, value)
    }

    /// Combine with the preceding criteria using `OR`.
    pub fn or(mut self) -> Self {
        self.combine = CombineOperator::Or;
        self
    }

    /// Render `table.column OPERATOR value`.
    ///
    /// With `use_placeholder` every scalar is pushed to `params` and replaced
    /// by the dialect's placeholder; otherwise values are inlined as quoted
    /// literals. Array values render as a parenthesized list and switch `=`
    /// and `!=` to `IN` and `NOT IN`. A NULL compared with `=` or `!=`
    /// renders as `IS NULL` or `IS NOT NULL`.
    pub fn render(
        &self,
        dialect: Dialect,
        table: &str,
        column: &str,
        use_placeholder: bool,
        params: &mut Vec<Value>,
    ) -> String {
        let lhs = dialect.qualified(table, column);
        let mut operator = self.operator;

        if self.value.is_null() {
            match operator {
                CriteriaOperator::Eq => operator = CriteriaOperator::IsNull,
                CriteriaOperator::Ne => operator = CriteriaOperator::IsNotNull,
                _ => {}
            }
        }
        if operator.is_unary() {
            return format!("{} {}", lhs, operator);
        }

        let items = match &self.value {
            Value::Array(items) => Some(items.as_slice()),
            _ if matches!(operator, CriteriaOperator::In | CriteriaOperator::NotIn) => {
                Some(std::slice::from_ref(&self.value))
            }
            _ => None,
        };

        if let Some(items) = items {
            let negated = matches!(operator, CriteriaOperator::Ne | CriteriaOperator::NotIn);
            if items.is_empty() {
                // IN () is not valid SQL
                return if negated { "1 = 1" } else { "1 = 0" }.to_string();
            }
            let keyword = if negated { "NOT IN" } else { "IN" };
            let list = if use_placeholder {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| {
                        params.push(item.clone());
                        dialect.placeholder(params.len())
                    })
                    .collect();
                format!("({})", parts.join(", "))
            } else {
                dialect.quote_literal(&Value::Array(items.to_vec()))
            };
            return format!("{} {} {}", lhs, keyword, list);
        }

        let rhs = if use_placeholder {
            params.push(self.value.clone());
            dialect.placeholder(params.len())
        } else {
            dialect.quote_literal(&self.value)
        };
        format!("{} {} {}", lhs, operator, rhs)
    }
}

/// Join rendered conditions with their combine operators.
///
/// The combine operator of the first condition is ignored. Conditions are
/// parenthesized when more than one is present.
pub fn combine_conditions(conditions: &[(CombineOperator, String)]) -> String {
    match conditions {
        [] => String::new(),
        [(_, only)] => only.clone(),
        [(_, first), rest @ ..] => {
            let mut sql = format!("({})", first);
            for (combine, condition) in rest {
                sql.push(' ');
                sql.push_str(combine.as_str());
                sql.push_str(" (");
                sql.push_str(condition);
                sql.push(')');
            }
            sql
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_literal_mysql() {
        let criteria = Criteria::eq("Book", "title", "Hamlet");
        let mut params = Vec::new();
        let sql = criteria.render(Dialect::Mysql, "wcmf_book", "title", false, &mut params);
        assert_eq!(sql, "`wcmf_book`.`title` = 'Hamlet'");
        assert!(params.is_empty());
    }

    #[test]
    fn render_placeholder_appends_params() {
        let mut params = vec![Value::Int(1)];
        let criteria = Criteria::new("Book", "year", CriteriaOperator::Ge, 1600);
        let sql = criteria.render(Dialect::Postgres, "book", "year", true, &mut params);
        assert_eq!(sql, "\"book\".\"year\" >= $2");
        assert_eq!(params, vec![Value::Int(1), Value::Int(1600)]);
    }

    #[test]
    fn render_array_as_in_list() {
        let criteria = Criteria::eq("Book", "id", vec![1_i64, 2, 3]);
        let mut params = Vec::new();
        let sql = criteria.render(Dialect::Sqlite, "book", "id", true, &mut params);
        assert_eq!(sql, "\"book\".\"id\" IN (?1, ?2, ?3)");
        assert_eq!(params.len(), 3);

        let literal = criteria.render(Dialect::Mysql, "book", "id", false, &mut Vec::new());
        assert_eq!(literal, "`book`.`id` IN (1, 2, 3)");

        let negated = Criteria::new("Book", "id", CriteriaOperator::Ne, vec![4_i64]);
        let sql = negated.render(Dialect::Mysql, "book", "id", false, &mut Vec::new());
        assert_eq!(sql, "`book`.`id` NOT IN (4)");
    }

    #[test]
    fn render_empty_array() {
        let criteria = Criteria::new("Book", "id", CriteriaOperator::In, Value::Array(vec![]));
        let sql = criteria.render(Dialect::Sqlite, "book", "id", true, &mut Vec::new());
        assert_eq!(sql, "1 = 0");
    }

    #[test]
    fn render_null_comparisons() {
        let mut params = Vec::new();
        let is_null = Criteria::eq("Chapter", "fk_book_id", Value::Null);
        assert_eq!(
            is_null.render(Dialect::Sqlite, "chapter", "fk_book_id", true, &mut params),
            "\"chapter\".\"fk_book_id\" IS NULL"
        );
        let not_null = Criteria::new("Chapter", "fk_book_id", CriteriaOperator::IsNotNull, Value::Null);
        assert_eq!(
            not_null.render(Dialect::Mysql, "chapter", "fk_book_id", true, &mut params),
            "`chapter`.`fk_book_id` IS NOT NULL"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("<>".parse::<CriteriaOperator>().unwrap(), CriteriaOperator::Ne);
        assert_eq!("not  in".parse::<CriteriaOperator>().unwrap(), CriteriaOperator::NotIn);
        assert!(matches!(
            "~".parse::<CriteriaOperator>(),
            Err(Error::IllegalArgument(_))
        ));
    }

    #[test]
    fn combine_with_or() {
        let conditions = vec![
            (CombineOperator::And, "a = 1".to_string()),
            (CombineOperator::Or, "b = 2".to_string()),
        ];
        assert_eq!(combine_conditions(&conditions), "(a = 1) OR (b = 2)");
        assert_eq!(combine_conditions(&conditions[..1]), "a = 1");
        assert_eq!(combine_conditions(&[]), "");
    }

    #[test]
    fn criteria_from_json() {
        let criteria: Criteria = serde_json::from_str(
            r#"{"type_name": "Book", "attribute": "title", "operator": "LIKE",
                "value": {"Text": "Ham%"}}"#,
        )
        .unwrap();
        assert_eq!(criteria.operator, CriteriaOperator::Like);
        assert_eq!(criteria.combine, CombineOperator::And);
    }
}
