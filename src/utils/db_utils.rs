use sqlx::{MySql, MySqlPool, mysql::MySqlArguments, query::Query};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    U8(u8),
    Null,
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::U64(value)
    }
}

impl From<u8> for SqlValue {
    fn from(value: u8) -> Self {
        SqlValue::U8(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug, PartialEq)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Collects `column = ?` assignments for a partial UPDATE. Column names are
/// static so only code can choose them, never request payloads.
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
}

impl UpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the assignment only when `value` is `Some`.
    pub fn set<T: Into<SqlValue>>(mut self, column: &'static str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.columns.push(column);
            self.values.push(value.into());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds `UPDATE table SET ... WHERE id_column = ?`, or `None` when no
    /// column was set.
    pub fn build(
        self,
        table: &str,
        id_column: &str,
        id_value: impl Into<SqlValue>,
    ) -> Option<SqlUpdate> {
        if self.is_empty() {
            return None;
        }

        let set_clause = self
            .columns
            .iter()
            .map(|k| format!("{} = ?", k))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

        let mut values = self.values;
        values.push(id_value.into());

        Some(SqlUpdate { sql, values })
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::String(v) => query.bind(v),
        SqlValue::U64(v) => query.bind(v),
        SqlValue::U8(v) => query.bind(v),
        SqlValue::Null => query.bind(None::<String>),
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = bind_value(query, value);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_only_the_columns_that_were_set() {
        let update = UpdateBuilder::new()
            .set("first_name", Some("Ana".to_string()))
            .set::<String>("last_name", None)
            .set("year_level", Some(3u8))
            .build("students", "id", 9u64)
            .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE students SET first_name = ?, year_level = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Ana".into()),
                SqlValue::U8(3),
                SqlValue::U64(9)
            ]
        );
    }

    #[test]
    fn nested_none_clears_the_column() {
        let update = UpdateBuilder::new()
            .set("phone", Some(None::<String>))
            .build("students", "id", 1u64)
            .unwrap();

        assert_eq!(update.values[0], SqlValue::Null);
    }

    #[test]
    fn empty_update_builds_nothing() {
        assert!(UpdateBuilder::new().build("courses", "id", 1u64).is_none());
    }
}
