use crate::data::connection::DbConnectionManager;
use crate::data::error::{DataError, DataResult};
use crate::data::mapping::{Entity, SqlValue, field_mapping, insert_params, insert_sql};
use rusqlite::{Connection, Rows, params_from_iter};
use std::sync::Arc;
use tracing::{debug, trace};

/// Receives every error raised by a template call. The call itself then
/// returns `None`.
pub type ExceptionHandler = fn(&DataError);

/// Generic SQL executor over the shared connection.
#[derive(Clone)]
pub struct SqlTemplate {
    manager: Arc<DbConnectionManager>,
}

impl SqlTemplate {
    pub fn new(manager: Arc<DbConnectionManager>) -> Self {
        Self { manager }
    }

    /// Runs `sql` with positional `params` and hands the row cursor to `mapper`.
    pub async fn execute_query<T, F>(
        &self,
        sql: &str,
        params: &[SqlValue],
        mapper: F,
        exception_handler: ExceptionHandler,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Rows<'_>) -> DataResult<T> + Send + 'static,
    {
        trace!(sql = sql, params = params.len(), "Executing query");
        let sql = sql.to_string();
        let params = params.to_vec();
        let result = self
            .manager
            .run(move |conn| query(conn, &sql, &params, mapper))
            .await;
        handle(result, exception_handler)
    }

    /// Inserts `entity` using its column table. `Some(true)` when a row was written.
    pub async fn execute_insert<E: Entity + Sync>(
        &self,
        entity: &E,
        exception_handler: ExceptionHandler,
    ) -> Option<bool> {
        handle(self.insert(entity).await, exception_handler)
    }

    /// Runs a fixed batch of statements, typically DDL, in one transaction.
    /// Nothing from the batch is kept when any statement fails.
    pub async fn execute_batch(
        &self,
        sql: &str,
        exception_handler: ExceptionHandler,
    ) -> Option<()> {
        trace!(sql = sql, "Executing batch");
        let sql = sql.to_string();
        let result = self
            .manager
            .run(move |conn| {
                let tx = conn.unchecked_transaction()?;
                tx.execute_batch(&sql)?;
                tx.commit()?;
                Ok(())
            })
            .await;
        handle(result, exception_handler)
    }

    async fn insert<E: Entity + Sync>(&self, entity: &E) -> DataResult<bool> {
        let sql = insert_sql::<E>()?;
        let params = insert_params(entity);
        debug!(sql = %sql, table = E::TABLE, "Built insert statement");
        self.manager
            .run(move |conn| {
                let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
                Ok(changed > 0)
            })
            .await
    }
}

fn handle<T>(result: DataResult<T>, exception_handler: ExceptionHandler) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            exception_handler(&e);
            None
        }
    }
}

fn query<T, F>(conn: &Connection, sql: &str, params: &[SqlValue], mapper: F) -> DataResult<T>
where
    F: FnOnce(&mut Rows<'_>) -> DataResult<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    mapper(&mut rows)
}

/// Maps every remaining row of the cursor.
pub fn map_all<E: Entity>(rows: &mut Rows<'_>) -> DataResult<Vec<E>> {
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(field_mapping::<E>(row)?);
    }
    Ok(entities)
}

/// Maps the first row of the cursor, ignoring the rest.
pub fn map_first<E: Entity>(rows: &mut Rows<'_>) -> DataResult<Option<E>> {
    match rows.next()? {
        Some(row) => Ok(Some(field_mapping::<E>(row)?)),
        None => Ok(None),
    }
}
