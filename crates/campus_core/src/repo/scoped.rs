//! Statement builder that always carries the tenant predicate.

use super::RepoResult;
use crate::tenant::TenantScope;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

/// SQL statement with the caller's tenant predicate already applied.
///
/// The head (`SELECT ... FROM t`, `UPDATE t SET a = ?`, `DELETE FROM t`) is
/// followed by `WHERE 1 = 1` and the scope predicate; filters append
/// `AND` clauses. All placeholders are positional `?`, bound in order.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    sql: String,
    binds: Vec<Value>,
}

impl ScopedQuery {
    /// Starts a read over `head`, scoping `merchant_column`.
    pub fn select(head: &str, merchant_column: &str, scope: &TenantScope) -> Self {
        Self::with_head(head, Vec::new(), merchant_column, scope)
    }

    /// Starts an `UPDATE`/`DELETE`, binding `head_binds` before any filter.
    pub fn mutate(
        head: &str,
        head_binds: Vec<Value>,
        merchant_column: &str,
        scope: &TenantScope,
    ) -> Self {
        Self::with_head(head, head_binds, merchant_column, scope)
    }

    fn with_head(
        head: &str,
        head_binds: Vec<Value>,
        merchant_column: &str,
        scope: &TenantScope,
    ) -> Self {
        let mut query = Self {
            sql: format!("{head} WHERE 1 = 1"),
            binds: head_binds,
        };
        if let Some((clause, value)) = scope.predicate(merchant_column) {
            query.sql.push_str(" AND ");
            query.sql.push_str(&clause);
            query.binds.push(value);
        }
        query
    }

    /// Appends `AND column = ?`.
    pub fn eq(mut self, column: &str, value: Value) -> Self {
        self.sql.push_str(&format!(" AND {column} = ?"));
        self.binds.push(value);
        self
    }

    /// Appends `AND column = ?` when `value` is present.
    pub fn eq_opt(self, column: &str, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    /// Appends a literal `AND` clause; its `?` placeholders bind `values`.
    pub fn and(mut self, clause: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.sql.push_str(" AND ");
        self.sql.push_str(clause);
        self.binds.extend(values);
        self
    }

    pub fn group_by(mut self, clause: &str) -> Self {
        self.sql.push_str(" GROUP BY ");
        self.sql.push_str(clause);
        self
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(clause);
        self
    }

    pub fn limit(mut self, limit: u32, offset: u32) -> Self {
        self.sql.push_str(" LIMIT ?");
        self.binds.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            self.sql.push_str(" OFFSET ?");
            self.binds.push(Value::Integer(i64::from(offset)));
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Collects every matching row through `parse`.
    pub fn fetch_all<T>(
        &self,
        conn: &Connection,
        mut parse: impl FnMut(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut stmt = conn.prepare(&self.sql)?;
        let mut rows = stmt.query(params_from_iter(self.binds.iter()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
        Ok(items)
    }

    /// Returns the first matching row, if any.
    pub fn fetch_optional<T>(
        &self,
        conn: &Connection,
        parse: impl FnOnce(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Option<T>> {
        let mut stmt = conn.prepare(&self.sql)?;
        let mut rows = stmt.query(params_from_iter(self.binds.iter()))?;
        match rows.next()? {
            Some(row) => Ok(Some(parse(row)?)),
            None => Ok(None),
        }
    }

    /// Runs an `UPDATE`/`DELETE` and returns changed rows.
    pub fn execute(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(&self.sql, params_from_iter(self.binds.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::ScopedQuery;
    use crate::tenant::TenantScope;
    use rusqlite::types::Value;
    use uuid::Uuid;

    #[test]
    fn merchant_scope_injects_predicate_first() {
        let merchant = Uuid::new_v4();
        let query = ScopedQuery::select(
            "SELECT uuid FROM students",
            "merchant_id",
            &TenantScope::Merchant(merchant),
        )
        .eq("class_name", Value::Text("7A".to_string()))
        .order_by("full_name ASC")
        .limit(10, 20);
        assert_eq!(
            query.sql(),
            "SELECT uuid FROM students WHERE 1 = 1 AND merchant_id = ? AND class_name = ? ORDER BY full_name ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(query.binds.len(), 4);
        assert_eq!(query.binds[0], Value::Text(merchant.to_string()));
    }

    #[test]
    fn global_scope_has_no_tenant_predicate() {
        let query =
            ScopedQuery::select("SELECT uuid FROM students", "merchant_id", &TenantScope::Global);
        assert_eq!(query.sql(), "SELECT uuid FROM students WHERE 1 = 1");
        assert!(query.binds.is_empty());
    }

    #[test]
    fn mutate_binds_head_values_before_scope() {
        let merchant = Uuid::new_v4();
        let query = ScopedQuery::mutate(
            "UPDATE students SET is_deleted = ?",
            vec![Value::Integer(1)],
            "merchant_id",
            &TenantScope::Merchant(merchant),
        )
        .eq("uuid", Value::Text("x".to_string()));
        assert_eq!(query.binds[0], Value::Integer(1));
        assert_eq!(query.binds[1], Value::Text(merchant.to_string()));
    }
}
