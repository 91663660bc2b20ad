//! SELECT statement assembly.

use crate::criteria::{CombineOperator, combine_conditions};
use crate::dialect::Dialect;
use crate::join::Join;
use wcmf_core::Value;

/// A selected column: `"table"."column" AS "alias"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub table: String,
    pub column: String,
    pub alias: String,
}

/// A SELECT over one base table with optional joins.
///
/// Conditions are pre-rendered fragments whose placeholders index into the
/// statement's own parameter list, so callers render criteria through
/// [`SelectStatement::params_mut`] in the order the fragments are added.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    dialect: Dialect,
    table: String,
    distinct: bool,
    columns: Vec<SelectColumn>,
    joins: Vec<Join>,
    conditions: Vec<(CombineOperator, String)>,
    params: Vec<Value>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectStatement {
    /// Create a SELECT from `table`.
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            distinct: false,
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            params: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The base table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Select `table.column AS alias`.
    pub fn column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.columns.push(SelectColumn {
            table: table.into(),
            column: column.into(),
            alias: alias.into(),
        });
        self
    }

    pub fn columns(&self) -> &[SelectColumn] {
        &self.columns
    }

    /// Add a JOIN clause.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a rendered condition.
    pub fn condition(&mut self, combine: CombineOperator, sql: impl Into<String>) {
        self.conditions.push((combine, sql.into()));
    }

    /// Parameter list that condition placeholders refer to.
    pub fn params_mut(&mut self) -> &mut Vec<Value> {
        &mut self.params
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Add a rendered ORDER BY key.
    pub fn order_by(&mut self, sql: impl Into<String>) {
        self.order_by.push(sql.into());
    }

    pub fn has_order_by(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    pub fn set_offset(&mut self, offset: Option<u64>) {
        self.offset = offset;
    }

    fn from_and_where(&self) -> String {
        let mut sql = format!(" FROM {}", self.dialect.quote_identifier(&self.table));
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(self.dialect));
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&combine_conditions(&self.conditions));
        }
        sql
    }

    /// Build the SELECT SQL and parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push_str(&self.dialect.quote_identifier(&self.table));
            sql.push_str(".*");
        } else {
            let cols: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    format!(
                        "{} AS {}",
                        self.dialect.qualified(&c.table, &c.column),
                        self.dialect.quote_identifier(&c.alias)
                    )
                })
                .collect();
            sql.push_str(&cols.join(", "));
        }
        sql.push_str(&self.from_and_where());
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        sql.push_str(&self.dialect.limit_clause(self.limit, self.offset));
        (sql, self.params.clone())
    }

    /// Build `SELECT COUNT(*)` over the same rows, ignoring order and paging.
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let sql = if self.distinct {
            let mut inner = self.clone();
            inner.order_by.clear();
            inner.limit = None;
            inner.offset = None;
            format!("SELECT COUNT(*) FROM ({}) AS counted", inner.build().0)
        } else {
            format!("SELECT COUNT(*){}", self.from_and_where())
        };
        (sql, self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criteria;

    fn book_select() -> SelectStatement {
        SelectStatement::new(Dialect::Sqlite, "wcmf_book")
            .column("wcmf_book", "id", "id")
            .column("wcmf_book", "book_title", "title")
    }

    #[test]
    fn select_all_columns_without_list() {
        let (sql, params) = SelectStatement::new(Dialect::Mysql, "book").build();
        assert_eq!(sql, "SELECT `book`.* FROM `book`");
        assert!(params.is_empty());
    }

    #[test]
    fn select_with_aliases_condition_order_and_paging() {
        let mut select = book_select();
        let criteria = Criteria::eq("Book", "title", "Hamlet");
        let fragment = criteria.render(
            Dialect::Sqlite,
            "wcmf_book",
            "book_title",
            true,
            select.params_mut(),
        );
        select.condition(CombineOperator::And, fragment);
        select.order_by("\"wcmf_book\".\"book_title\" ASC");
        select.set_limit(Some(10));
        select.set_offset(Some(20));

        let (sql, params) = select.build();
        assert_eq!(
            sql,
            "SELECT \"wcmf_book\".\"id\" AS \"id\", \"wcmf_book\".\"book_title\" AS \"title\" \
             FROM \"wcmf_book\" WHERE \"wcmf_book\".\"book_title\" = ?1 \
             ORDER BY \"wcmf_book\".\"book_title\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![Value::from("Hamlet")]);
    }

    #[test]
    fn count_ignores_order_and_paging() {
        let mut select = book_select();
        select.condition(CombineOperator::And, "\"wcmf_book\".\"id\" > ?1");
        select.params_mut().push(Value::Int(3));
        select.order_by("\"wcmf_book\".\"id\" DESC");
        select.set_limit(Some(1));

        let (sql, params) = select.build_count();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM \"wcmf_book\" WHERE \"wcmf_book\".\"id\" > ?1"
        );
        assert_eq!(params, vec![Value::Int(3)]);
    }

    #[test]
    fn select_with_join() {
        let mut select = SelectStatement::new(Dialect::Mysql, "book")
            .column("book", "id", "id")
            .join(Join::inner("chapter", ("chapter", "fk_book_id"), ("book", "id")));
        select.condition(CombineOperator::And, "`chapter`.`id` = ?");
        select.params_mut().push(Value::Int(7));

        let (sql, _) = select.build();
        assert_eq!(
            sql,
            "SELECT `book`.`id` AS `id` FROM `book` \
             INNER JOIN `chapter` ON `chapter`.`fk_book_id` = `book`.`id` \
             WHERE `chapter`.`id` = ?"
        );
    }
}
