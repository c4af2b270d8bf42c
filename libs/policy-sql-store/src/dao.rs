//! Data access layer: builds and executes every statement against the
//! caller-supplied pool.
//!
//! Argument values are always bound, never interpolated. Single-row
//! operations auto-commit; batch operations run every statement inside one
//! transaction with all-or-nothing semantics. Dropping an in-flight future
//! (caller cancellation) drops the transaction, which rolls back.

use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{AnyPool, Row};
use tracing::debug;

use crate::dialect::{DriverFamily, StatementSet};
use crate::error::AdapterError;
use crate::model::{COLUMN_COUNT, PolicyFilter, StoredRule};
use crate::rebind::rebind;

pub(crate) struct PolicyDao {
    pool: AnyPool,
    sql: StatementSet,
}

/// A statement executed inside a batch transaction ahead of the per-row
/// statement, e.g. the delete half of a replace.
struct BatchStep {
    step: &'static str,
    sql: String,
    args: Vec<String>,
}

fn bind_args<'q>(sql: &'q str, args: &'q [String]) -> Query<'q, Any, AnyArguments<'q>> {
    let mut query: Query<'q, Any, AnyArguments<'q>> = sqlx::query(sql);
    for arg in args {
        query = query.bind(arg.as_str());
    }
    query
}

fn column(row: &AnyRow, idx: usize) -> Result<String, sqlx::Error> {
    // NULL maps to the empty string so tables created by older revisions
    // with NULLable value columns still load.
    Ok(row.try_get::<Option<String>, _>(idx)?.unwrap_or_default())
}

fn rule_from_row(row: &AnyRow) -> Result<StoredRule, sqlx::Error> {
    Ok(StoredRule {
        p_type: column(row, 0)?,
        v0: column(row, 1)?,
        v1: column(row, 2)?,
        v2: column(row, 3)?,
        v3: column(row, 4)?,
        v4: column(row, 5)?,
        v5: column(row, 6)?,
    })
}

impl PolicyDao {
    pub fn new(pool: AnyPool, family: DriverFamily, table: &str) -> Self {
        Self {
            pool,
            sql: StatementSet::new(family, table),
        }
    }

    async fn exec(&self, sql: &str, args: &[String]) -> Result<(), AdapterError> {
        bind_args(sql, args).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_rules(&self, sql: &str, args: &[String]) -> Result<Vec<StoredRule>, AdapterError> {
        let rows = bind_args(sql, args).fetch_all(&self.pool).await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            rules.push(rule_from_row(row)?);
        }

        Ok(rules)
    }

    /// Execute `before` (if any) and then the per-row statement once per row,
    /// all inside one transaction. Any failure rolls everything back; a
    /// rollback failure is reported together with the original cause.
    async fn run_batch(
        &self,
        before: Option<BatchStep>,
        row_sql: &str,
        rows: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        let mut tx = self.pool.begin().await.map_err(|e| AdapterError::Transaction {
            step: "begin transaction",
            source: e,
        })?;

        match apply_batch(&mut tx, before, row_sql, rows).await {
            Ok(()) => tx.commit().await.map_err(|e| AdapterError::Transaction {
                step: "commit transaction",
                source: e,
            }),
            Err((step, source)) => match tx.rollback().await {
                Ok(()) => Err(AdapterError::Transaction { step, source }),
                Err(rollback) => Err(AdapterError::TransactionRollback {
                    step,
                    source,
                    rollback,
                }),
            },
        }
    }

    pub async fn create_table(&self) -> Result<(), AdapterError> {
        debug!("creating policy table");
        for statement in &self.sql.create_table {
            self.exec(statement, &[]).await?;
        }
        Ok(())
    }

    /// Probe the table with a zero-row SELECT. Any execution error is read
    /// as "table absent", so a connectivity failure here is indistinguishable
    /// from a missing table; construction then attempts the CREATE and
    /// surfaces that error instead.
    pub async fn is_table_exist(&self) -> bool {
        self.exec(&self.sql.table_exist, &[]).await.is_ok()
    }

    pub async fn select_all(&self) -> Result<Vec<StoredRule>, AdapterError> {
        self.fetch_rules(&self.sql.select_all, &[]).await
    }

    /// Dynamic WHERE per non-empty filter column, `=` for one value and
    /// `IN (...)` for several, joined with `AND` in fixed column order.
    /// An unconstrained filter collapses to a plain select-all.
    pub async fn select_by_filter(
        &self,
        filter: &PolicyFilter,
    ) -> Result<Vec<StoredRule>, AdapterError> {
        if filter.is_empty() {
            return self.select_all().await;
        }

        let mut sql = self.sql.select_where.clone();
        let mut args: Vec<String> = Vec::new();

        for (name, values) in filter.column_values() {
            if values.is_empty() {
                continue;
            }
            if !args.is_empty() {
                sql.push_str(" AND ");
            }
            sql.push_str(name);

            if values.len() == 1 {
                sql.push_str("=?");
                args.push(values[0].clone());
            } else {
                sql.push_str(" IN (");
                for i in 0..values.len() {
                    if i > 0 {
                        sql.push(',');
                    }
                    sql.push('?');
                }
                sql.push(')');
                args.extend_from_slice(values);
            }
        }

        let sql = rebind(&sql, self.sql.placeholder);
        self.fetch_rules(&sql, &args).await
    }

    /// Select rows matching `p_type=?` plus a prebuilt condition (the args
    /// start with the ptype, see `model::filtered_condition`).
    pub async fn select_by_condition(
        &self,
        condition: &str,
        args: &[String],
    ) -> Result<Vec<StoredRule>, AdapterError> {
        let mut sql = self.sql.select_where.clone();
        sql.push_str("p_type=?");
        sql.push_str(condition);

        let sql = rebind(&sql, self.sql.placeholder);
        self.fetch_rules(&sql, args).await
    }

    pub async fn insert_row(&self, args: &[String]) -> Result<(), AdapterError> {
        self.exec(&self.sql.insert_row, args).await
    }

    /// Exact-match replacement: 14 args, the new fixed-width tuple followed
    /// by the old one for the WHERE clause.
    pub async fn update_row(&self, args: &[String]) -> Result<(), AdapterError> {
        self.exec(&self.sql.update_row, args).await
    }

    pub async fn insert_rows(&self, rows: &[Vec<String>]) -> Result<(), AdapterError> {
        self.run_batch(None, &self.sql.insert_row, rows).await
    }

    pub async fn update_rows(&self, rows: &[Vec<String>]) -> Result<(), AdapterError> {
        self.run_batch(None, &self.sql.update_row, rows).await
    }

    pub async fn delete_rows(&self, rows: &[Vec<String>]) -> Result<(), AdapterError> {
        self.run_batch(None, &self.sql.delete_row, rows).await
    }

    /// Transactional full replace: DML delete-all followed by the batch
    /// insert, in one transaction. A TRUNCATE would be DDL and not
    /// transactional on every dialect, which is why it is a DELETE.
    pub async fn delete_all_and_insert_rows(
        &self,
        rows: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        let delete_all = BatchStep {
            step: "delete all rows",
            sql: self.sql.delete_all.clone(),
            args: Vec::new(),
        };
        self.run_batch(Some(delete_all), &self.sql.insert_row, rows)
            .await
    }

    /// Transactional replace of the rows matching a condition with a new
    /// set: delete-by-condition followed by the batch insert.
    pub async fn update_filtered_rows(
        &self,
        delete_condition: &str,
        delete_args: Vec<String>,
        rows: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        let mut delete_sql = self.sql.delete_by_args.clone();
        delete_sql.push_str(delete_condition);

        let delete_filtered = BatchStep {
            step: "delete filtered rows",
            sql: rebind(&delete_sql, self.sql.placeholder),
            args: delete_args,
        };
        self.run_batch(Some(delete_filtered), &self.sql.insert_row, rows)
            .await
    }

    /// Delete rows matching the ptype and every non-empty field of a rule at
    /// its column position.
    pub async fn delete_by_args(&self, ptype: &str, fields: &[String]) -> Result<(), AdapterError> {
        let mut sql = self.sql.delete_by_args.clone();
        let mut args = Vec::with_capacity(COLUMN_COUNT);
        args.push(ptype.to_owned());

        for (idx, field) in fields.iter().enumerate() {
            if !field.is_empty() {
                sql.push_str(" AND v");
                sql.push_str(&idx.to_string());
                sql.push_str("=?");
                args.push(field.clone());
            }
        }

        let sql = rebind(&sql, self.sql.placeholder);
        self.exec(&sql, &args).await
    }

    /// Delete rows matching `p_type=?` plus a prebuilt condition.
    pub async fn delete_by_condition(
        &self,
        condition: &str,
        args: &[String],
    ) -> Result<(), AdapterError> {
        let mut sql = self.sql.delete_by_args.clone();
        sql.push_str(condition);

        let sql = rebind(&sql, self.sql.placeholder);
        self.exec(&sql, args).await
    }
}

async fn apply_batch(
    tx: &mut sqlx::Transaction<'static, Any>,
    before: Option<BatchStep>,
    row_sql: &str,
    rows: &[Vec<String>],
) -> Result<(), (&'static str, sqlx::Error)> {
    if let Some(step) = &before {
        bind_args(&step.sql, &step.args)
            .execute(&mut **tx)
            .await
            .map_err(|e| (step.step, e))?;
    }

    // sqlx prepares the statement once per connection and caches it, so the
    // loop reuses a single prepared statement.
    for row in rows {
        bind_args(row_sql, row)
            .execute(&mut **tx)
            .await
            .map_err(|e| ("execute batch statement", e))?;
    }

    Ok(())
}
