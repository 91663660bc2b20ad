//! SQL construction for the wCMF relational mapper.
//!
//! `wcmf-query` is the **statement layer**. It knows nothing about persistent
//! types; the mapper resolves attributes to tables and columns and uses the
//! pieces here to render them:
//!
//! - **Dialects**: identifier quoting, placeholders, literals and the
//!   sequence-table statements for SQLite, MySQL and PostgreSQL.
//! - **Criteria**: typed attribute conditions rendered as bound or literal
//!   SQL fragments.
//! - **Statements**: SELECT with joins, paging and count variants, plus
//!   INSERT, UPDATE and DELETE builders.

pub mod builder;
pub mod clause;
pub mod criteria;
pub mod dialect;
pub mod join;
pub mod select;

pub use builder::{DeleteStatement, InsertStatement, UpdateStatement};
pub use clause::{OrderBy, OrderDirection};
pub use criteria::{CombineOperator, Criteria, CriteriaOperator, combine_conditions};
pub use dialect::{Dialect, SequenceAdvance};
pub use join::{Join, JoinType};
pub use select::{SelectColumn, SelectStatement};
