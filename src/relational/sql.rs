// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL Renderer
//!
//! Renders [`CountOptions`] / [`FindAllOptions`] into parameterized SQL.
//!
//! # SQL Generated
//!
//! ```sql
//! SELECT COUNT(DISTINCT `users`.`id`) AS cnt
//! FROM `users` AS `users`
//! INNER JOIN `profiles` AS `profile`
//!   ON `profile`.`id` = `users`.`profile_id` AND `profile`.`age` > ?
//! LEFT JOIN `addresses` AS `profile->address`
//!   ON `profile->address`.`id` = `profile`.`address_id`
//! WHERE `users`.`name` = ?
//! ```
//!
//! Join conditions live in the `ON` clause, so an optional (LEFT) join with
//! a where-fragment filters the joined rows but never the root rows. Joined
//! columns are aliased by dotted path (`profile.address.city`).
//!
//! When a one-to-many join is present the root key is also selected as
//! [`ROOT_KEY_ALIAS`] so rows can be folded back into one record per root,
//! and any paging applies to root rows in a derived table.

use super::join_tree::{JoinNode, WhereClause};
use super::operators::SqlCondition;
use super::search::{CountOptions, FindAllOptions};
use super::sort::OrderTerm;
use crate::criteria::split_path;

/// Hidden column carrying the root primary key when joins fan out.
pub const ROOT_KEY_ALIAS: &str = "__root_key";

/// SQL parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
}

/// Parameterized statement with `?` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    /// Statement with inline values.
    ///
    /// Warning: Only use for debugging, not for actual queries (SQL injection risk)
    #[must_use]
    pub fn to_inline(&self) -> String {
        let mut params = self.params.iter().peekable();
        let mut out = String::with_capacity(self.sql.len());
        for ch in self.sql.chars() {
            match (ch, params.next_if(|_| ch == '?')) {
                (_, Some(SqlParam::Text(s))) => {
                    out.push('\'');
                    out.push_str(&s.replace('\'', "''"));
                    out.push('\'');
                }
                (_, Some(SqlParam::Integer(n))) => out.push_str(&n.to_string()),
                (c, None) => out.push(c),
            }
        }
        out
    }
}

/// Target SQL flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    MySql,
}

impl SqlDialect {
    /// Detect from a connection URL.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Self::Sqlite
        } else {
            Self::MySql
        }
    }

    /// `LIMIT` value meaning "no limit", for offset-only paging.
    fn unbounded_limit(self) -> i64 {
        match self {
            Self::Sqlite => -1,
            Self::MySql => i64::MAX,
        }
    }
}

/// The root model a search runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntity {
    pub table: String,
    pub primary_key: String,
    /// Selected when the search carries no root projection
    pub columns: Vec<String>,
    pub schema: Option<String>,
}

impl RootEntity {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            columns: Vec::new(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn quote_table(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote(schema), quote(table)),
        None => quote(table),
    }
}

fn column(alias: &str, name: &str) -> String {
    format!("{}.{}", quote(alias), quote(name))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn render_condition(col: &str, condition: &SqlCondition, params: &mut Vec<SqlParam>) -> String {
    let scalar = |op: &str, value: &str, params: &mut Vec<SqlParam>| {
        params.push(SqlParam::Text(value.to_string()));
        format!("{} {} ?", col, op)
    };
    match condition {
        SqlCondition::Eq(v) => scalar("=", v, params),
        SqlCondition::Ne(v) => scalar("<>", v, params),
        SqlCondition::Gt(v) => scalar(">", v, params),
        SqlCondition::Gte(v) => scalar(">=", v, params),
        SqlCondition::Lt(v) => scalar("<", v, params),
        SqlCondition::Lte(v) => scalar("<=", v, params),
        SqlCondition::Like(v) => scalar("LIKE", v, params),
        SqlCondition::ILike(v) => {
            params.push(SqlParam::Text(v.clone()));
            format!("LOWER({}) LIKE LOWER(?)", col)
        }
        // Empty membership lists: IN () matches nothing, NOT IN () matches everything
        SqlCondition::In(values) if values.is_empty() => "1=0".to_string(),
        SqlCondition::NotIn(values) if values.is_empty() => "1=1".to_string(),
        SqlCondition::In(values) => {
            params.extend(values.iter().cloned().map(SqlParam::Text));
            format!("{} IN ({})", col, placeholders(values.len()))
        }
        SqlCondition::NotIn(values) => {
            params.extend(values.iter().cloned().map(SqlParam::Text));
            format!("{} NOT IN ({})", col, placeholders(values.len()))
        }
        SqlCondition::Between(low, high) => {
            params.push(SqlParam::Text(low.clone()));
            params.push(SqlParam::Text(high.clone()));
            format!("{} BETWEEN ? AND ?", col)
        }
        SqlCondition::NotBetween(low, high) => {
            params.push(SqlParam::Text(low.clone()));
            params.push(SqlParam::Text(high.clone()));
            format!("{} NOT BETWEEN ? AND ?", col)
        }
    }
}

fn render_where(alias: &str, clause: &WhereClause, params: &mut Vec<SqlParam>) -> Vec<String> {
    clause
        .iter()
        .map(|(attribute, condition)| render_condition(&column(alias, attribute), condition, params))
        .collect()
}

/// Join alias for a relationship path: `profile->address`.
fn join_alias(path: &[&str]) -> String {
    path.join("->")
}

/// Renders statements for one root entity.
pub struct SqlRenderer<'a> {
    root: &'a RootEntity,
    dialect: SqlDialect,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(root: &'a RootEntity, dialect: SqlDialect) -> Self {
        Self { root, dialect }
    }

    fn root_alias(&self) -> &str {
        &self.root.table
    }

    fn root_table(&self) -> String {
        quote_table(self.root.schema.as_deref(), &self.root.table)
    }

    fn render_joins(&self, nodes: &[JoinNode], parent: &[&str], params: &mut Vec<SqlParam>) -> String {
        let mut out = String::new();
        for node in nodes {
            let mut path = parent.to_vec();
            path.push(node.relationship.as_str());
            let alias = join_alias(&path);
            let parent_alias = if parent.is_empty() {
                self.root_alias().to_string()
            } else {
                join_alias(parent)
            };

            let mut on = vec![format!(
                "{} = {}",
                column(&alias, &node.model.entity.foreign_key),
                column(&parent_alias, &node.model.entity.local_key)
            )];
            if let Some(clause) = &node.where_clause {
                on.extend(render_where(&alias, clause, params));
            }

            let kind = if node.required { "INNER JOIN" } else { "LEFT JOIN" };
            out.push_str(&format!(
                " {} {} AS {} ON {}",
                kind,
                quote_table(node.model.schema.as_deref(), &node.model.entity.table),
                quote(&alias),
                on.join(" AND ")
            ));
            out.push_str(&self.render_joins(&node.children, &path, params));
        }
        out
    }

    fn render_root_where(&self, clause: &WhereClause, params: &mut Vec<SqlParam>) -> String {
        let parts = render_where(self.root_alias(), clause, params);
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    fn select_list(&self, options: &FindAllOptions) -> String {
        let root_columns = options.attributes.as_deref().unwrap_or(&self.root.columns);
        let mut cols: Vec<String> = if root_columns.is_empty() {
            vec![format!("{}.*", quote(self.root_alias()))]
        } else {
            root_columns
                .iter()
                .map(|c| format!("{} AS {}", column(self.root_alias(), c), quote(c)))
                .collect()
        };

        if options.include.has_many() {
            cols.push(format!(
                "{} AS {}",
                column(self.root_alias(), &self.root.primary_key),
                quote(ROOT_KEY_ALIAS)
            ));
        }

        for (path, node) in options.include.walk() {
            let alias = join_alias(&path);
            let dotted = path.join(".");
            let node_columns = node.attributes.as_deref().unwrap_or(&node.model.entity.columns);
            cols.extend(node_columns.iter().map(|c| {
                format!("{} AS {}", column(&alias, c), quote(&format!("{}.{}", dotted, c)))
            }));
        }
        cols.join(", ")
    }

    /// Dotted field → qualified column reference.
    fn field_ref(&self, field: &str) -> String {
        let (path, name) = split_path(field);
        if path.is_empty() {
            column(self.root_alias(), name)
        } else {
            column(&join_alias(&path), name)
        }
    }

    fn order_ref(&self, term: &OrderTerm) -> String {
        let alias = if term.path.is_empty() {
            self.root_alias().to_string()
        } else {
            term.path.join("->")
        };
        format!("{} {}", column(&alias, &term.column), term.order.as_str())
    }

    fn render_order(&self, terms: &[OrderTerm]) -> String {
        if terms.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = terms.iter().map(|t| self.order_ref(t)).collect();
        format!(" ORDER BY {}", parts.join(", "))
    }

    fn render_paging(&self, limit: Option<u64>, offset: Option<u64>, params: &mut Vec<SqlParam>) -> String {
        let as_param = |v: u64| SqlParam::Integer(i64::try_from(v).unwrap_or(i64::MAX));
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => {
                params.push(as_param(limit));
                " LIMIT ?".to_string()
            }
            (Some(limit), Some(offset)) => {
                params.push(as_param(limit));
                params.push(as_param(offset));
                " LIMIT ? OFFSET ?".to_string()
            }
            (None, Some(offset)) => {
                params.push(SqlParam::Integer(self.dialect.unbounded_limit()));
                params.push(as_param(offset));
                " LIMIT ? OFFSET ?".to_string()
            }
        }
    }

    /// `SELECT COUNT(...) AS cnt ...`
    #[must_use]
    pub fn count(&self, options: &CountOptions) -> SqlStatement {
        let mut params = Vec::new();
        let target = if options.distinct {
            format!("COUNT(DISTINCT {})", column(self.root_alias(), &self.root.primary_key))
        } else {
            "COUNT(*)".to_string()
        };
        let joins = self.render_joins(options.include.nodes(), &[], &mut params);
        let where_sql = self.render_root_where(&options.where_clause, &mut params);
        let sql = format!(
            "SELECT {} AS cnt FROM {} AS {}{}{}",
            target,
            self.root_table(),
            quote(self.root_alias()),
            joins,
            where_sql
        );
        SqlStatement { sql, params }
    }

    /// Row fetch. Root rows are paged in a derived table before the joins
    /// fan out when `sub_query` is set with joins and a limit, or whenever a
    /// one-to-many join meets any paging.
    #[must_use]
    pub fn find_all(&self, options: &FindAllOptions) -> SqlStatement {
        let paged = options.limit.is_some() || options.offset.is_some();
        let sub_query = options.sub_query && !options.include.is_empty() && options.limit.is_some();
        if sub_query || (paged && options.include.has_many()) {
            return self.find_all_paged_roots(options);
        }

        let mut params = Vec::new();
        let joins = self.render_joins(options.include.nodes(), &[], &mut params);
        let where_sql = self.render_root_where(&options.where_clause, &mut params);
        let group = self.render_group(&options.group);
        let order = self.render_order(&options.order);
        let paging = self.render_paging(options.limit, options.offset, &mut params);
        let sql = format!(
            "SELECT {} FROM {} AS {}{}{}{}{}{}",
            self.select_list(options),
            self.root_table(),
            quote(self.root_alias()),
            joins,
            where_sql,
            group,
            order,
            paging
        );
        SqlStatement { sql, params }
    }

    fn find_all_paged_roots(&self, options: &FindAllOptions) -> SqlStatement {
        let mut params = Vec::new();
        let root = quote(self.root_alias());

        let inner_joins = self.render_joins(options.include.nodes(), &[], &mut params);
        let where_sql = self.render_root_where(&options.where_clause, &mut params);
        // DISTINCT over root columns can only be ordered by root columns
        let root_order: Vec<OrderTerm> = options
            .order
            .iter()
            .filter(|t| t.path.is_empty())
            .cloned()
            .collect();
        let inner_order = self.render_order(&root_order);
        let paging = self.render_paging(options.limit, options.offset, &mut params);
        let inner = format!(
            "SELECT DISTINCT {}.* FROM {} AS {}{}{}{}{}",
            root,
            self.root_table(),
            root,
            inner_joins,
            where_sql,
            inner_order,
            paging
        );

        let outer_joins = self.render_joins(options.include.nodes(), &[], &mut params);
        let sql = format!(
            "SELECT {} FROM ({}) AS {}{}{}{}",
            self.select_list(options),
            inner,
            root,
            outer_joins,
            self.render_group(&options.group),
            self.render_order(&options.order)
        );
        SqlStatement { sql, params }
    }

    fn render_group(&self, fields: &[String]) -> String {
        if fields.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = fields.iter().map(|f| self.field_ref(f)).collect();
        format!(" GROUP BY {}", parts.join(", "))
    }
}
