//! Composed-query IR and SQL rendering.
//!
//! A fetch activation composes exactly one `SelectQuery`. The typed shape
//! is authoritative; `to_sql()` renders it as parameterized SQL for stores
//! that consume text. Correlation happens by expanding one JSON-array
//! parameter into a derived row set and joining it against the root table.

use crate::value::{StorageClass, Value};
use std::fmt::Write as _;

/// Root-table alias used by every fetch step.
pub const ROOT_ALIAS: &str = "t";

/// Synthetic correlation-table alias.
pub const CORRELATION_ALIAS: &str = "batch";

/// Output column carrying the originating call index.
pub const IDX_COLUMN: &str = "idx";

/// Separator between alias and column in output column names.
pub const ALIAS_SEP: &str = "__";

/// Output column name for one alias-scoped projected column.
#[must_use]
pub fn output_column(alias: &str, column: &str) -> String {
    format!("{alias}{ALIAS_SEP}{column}")
}

///
/// SelectQuery
///
/// One composed, single-round-trip query: typed shape plus positional
/// parameters. The correlation payload, when present, is a JSON-encoded
/// array of per-call tuples carried as one text parameter.
///

#[derive(Clone, Debug)]
pub struct SelectQuery {
    pub shape: QueryShape,
    pub params: Vec<Value>,
}

impl SelectQuery {
    /// Render parameterized SQL text with `$1`-style placeholders.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.shape.render()
    }
}

///
/// QueryShape
///

#[derive(Clone, Debug)]
pub struct QueryShape {
    pub table: &'static str,
    pub root_alias: String,
    pub correlation: Option<CorrelationShape>,
    pub joins: Vec<JoinShape>,
    pub projection: Vec<ProjectedColumn>,
    pub conditions: Vec<String>,
}

impl QueryShape {
    fn render(&self) -> String {
        let mut sql = String::from("SELECT ");

        let mut select_items = Vec::new();
        if let Some(correlation) = &self.correlation {
            select_items.push(format!(
                "{alias}.{IDX_COLUMN} AS {IDX_COLUMN}",
                alias = correlation.alias
            ));
        }
        for projected in &self.projection {
            select_items.push(format!(
                "{}.\"{}\" AS \"{}\"",
                projected.alias, projected.column, projected.output
            ));
        }
        sql.push_str(&select_items.join(", "));

        let _ = write!(
            sql,
            " FROM \"{table}\" AS {alias}",
            table = self.table,
            alias = self.root_alias
        );

        if let Some(correlation) = &self.correlation {
            let mut decl = vec![format!("{IDX_COLUMN} bigint")];
            for column in &correlation.columns {
                decl.push(format!("\"{}\" {}", column.name, column.class.sql_type()));
            }
            let on = correlation
                .filter_join
                .iter()
                .map(|(root_column, corr_column)| {
                    format!(
                        "{root}.\"{root_column}\" = {corr}.\"{corr_column}\"",
                        root = self.root_alias,
                        corr = correlation.alias
                    )
                })
                .collect::<Vec<_>>();
            let _ = write!(
                sql,
                " JOIN jsonb_to_recordset(${param}) AS {alias}({decl}) ON {on}",
                param = correlation.param_index + 1,
                alias = correlation.alias,
                decl = decl.join(", "),
                on = on.join(" AND "),
            );
        }

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::LeftOne => "LEFT JOIN",
            };
            let mut on = join
                .on
                .iter()
                .map(|(parent_column, join_column)| {
                    format!(
                        "{alias}.\"{join_column}\" = {parent}.\"{parent_column}\"",
                        alias = join.alias,
                        parent = join.parent_alias
                    )
                })
                .collect::<Vec<_>>();
            if let Some(extra) = &join.extra {
                on.push(format!("({extra})"));
            }
            let _ = write!(
                sql,
                " {keyword} \"{table}\" AS {alias} ON {on}",
                table = join.table,
                alias = join.alias,
                on = on.join(" AND "),
            );
        }

        if !self.conditions.is_empty() {
            let clauses = self
                .conditions
                .iter()
                .map(|condition| format!("({condition})"))
                .collect::<Vec<_>>();
            let _ = write!(sql, " WHERE {}", clauses.join(" AND "));
        }

        sql
    }
}

///
/// CorrelationShape
///
/// The expanded-JSON derived table: tuple layout is `[idx, c_1 .. c_n]`
/// where `c_i` follows `columns` order (filter columns first, then
/// registered parameters).
///

#[derive(Clone, Debug)]
pub struct CorrelationShape {
    pub alias: String,
    /// Index into `SelectQuery::params` of the JSON payload.
    pub param_index: usize,
    /// Non-idx correlation columns in tuple order.
    pub columns: Vec<CorrelationColumn>,
    /// Equality pairs joining the root table to the correlation table:
    /// (root column, correlation column).
    pub filter_join: Vec<(String, String)>,
}

///
/// CorrelationColumn
///

#[derive(Clone, Debug)]
pub struct CorrelationColumn {
    pub name: String,
    pub class: StorageClass,
}

///
/// JoinShape
///

#[derive(Clone, Debug)]
pub struct JoinShape {
    pub kind: JoinKind,
    pub table: &'static str,
    pub alias: String,
    pub parent_alias: String,
    /// Equality pairs: (column on `parent_alias`, column on `alias`).
    pub on: Vec<(String, String)>,
    /// Extra raw correlation SQL, scoped to `parent_alias`/`alias`.
    pub extra: Option<String>,
}

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    /// Required relation; restricts the row set.
    Inner,
    /// Optional to-one relation; decoded as a nested entity value.
    LeftOne,
}

///
/// ProjectedColumn
///

#[derive(Clone, Debug)]
pub struct ProjectedColumn {
    pub alias: String,
    pub column: String,
    pub output: String,
}

impl ProjectedColumn {
    #[must_use]
    pub fn new(alias: &str, column: &str) -> Self {
        Self {
            alias: alias.to_string(),
            column: column.to_string(),
            output: output_column(alias, column),
        }
    }
}

///
/// TESTS
///
