//! JOIN clause types.

use crate::dialect::Dialect;

/// Types of SQL joins the mapper issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN of `table AS alias` on an equality of two qualified columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub alias: Option<String>,
    /// `(table or alias, column)` on the joined side
    pub on_left: (String, String),
    /// `(table or alias, column)` on the already present side
    pub on_right: (String, String),
}

impl Join {
    /// Create an INNER JOIN.
    pub fn inner(
        table: impl Into<String>,
        on_left: (impl Into<String>, impl Into<String>),
        on_right: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            join_type: JoinType::Inner,
            table: table.into(),
            alias: None,
            on_left: (on_left.0.into(), on_left.1.into()),
            on_right: (on_right.0.into(), on_right.1.into()),
        }
    }

    /// Set the table alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Generate the JOIN SQL.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!(
            "{} {}",
            self.join_type.as_str(),
            dialect.quote_identifier(&self.table)
        );
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&dialect.qualified(&self.on_left.0, &self.on_left.1));
        sql.push_str(" = ");
        sql.push_str(&dialect.qualified(&self.on_right.0, &self.on_right.1));
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_join_with_alias() {
        let join = Join::inner(
            "wcmf_chapter",
            ("chapter", "fk_book_id"),
            ("wcmf_book", "id"),
        )
        .alias("chapter");
        assert_eq!(
            join.to_sql(Dialect::Sqlite),
            "INNER JOIN \"wcmf_chapter\" AS \"chapter\" ON \"chapter\".\"fk_book_id\" = \"wcmf_book\".\"id\""
        );
    }

    #[test]
    fn inner_join_mysql() {
        let join = Join::inner("book_author", ("book_author", "fk_book_id"), ("book", "id"));
        assert_eq!(
            join.to_sql(Dialect::Mysql),
            "INNER JOIN `book_author` ON `book_author`.`fk_book_id` = `book`.`id`"
        );
    }
}
