// PostgreSQL procedure call integration tests
//
// Run with:
//   cargo test --test postgres_call_test -- --ignored
// Requires PostgreSQL running at postgres://postgres:@127.0.0.1/test-sqlx-tokio
// (override with DATABASE_URL)

#[cfg(test)]
mod postgres_call_tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serial_test::serial;
    use sqlx::PgPool;
    use sqlx_marshal::driver::postgres::{self, PgParameters};
    use sqlx_marshal::{
        ArrayValue, CursorState, ErrorKind, FieldDef, FieldKind, Parameter, RecordType, TypedValue, Value,
    };

    async fn get_test_pool() -> PgPool {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres:@127.0.0.1/test-sqlx-tokio".to_string());

        sqlx::PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    async fn create_test_table(pool: &PgPool) {
        sqlx::query("DROP TABLE IF EXISTS marshal_accounts")
            .execute(pool)
            .await
            .expect("Failed to drop existing table");

        sqlx::query(
            r#"
            CREATE TABLE marshal_accounts (
                id INTEGER PRIMARY KEY,
                owner VARCHAR(100) NOT NULL,
                balance NUMERIC(12, 2),
                opened DATE
            )
            "#,
        )
        .execute(pool)
        .await
        .expect("Failed to create test table");
    }

    fn account_shape() -> Arc<RecordType> {
        Arc::new(RecordType::new(
            "Account",
            vec![
                FieldDef::new("id", FieldKind::Int),
                FieldDef::new("owner", FieldKind::Text),
                FieldDef::new("balance", FieldKind::Decimal).nullable(),
                FieldDef::new("opened", FieldKind::Date).nullable(),
            ],
        ))
    }

    async fn insert_account(pool: &PgPool, params: &[Parameter]) -> Result<u64, Box<dyn std::error::Error>> {
        let mut call = postgres::call(
            pool,
            "INSERT INTO marshal_accounts (id, owner, balance, opened) VALUES ($1, $2, $3, $4)",
            params,
            vec![],
        )
        .await?;
        assert!(!call.next_query_result()?);
        Ok(call.execution_result().map(|s| s.affected_row_count).unwrap_or(0))
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn test_typed_parameters_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let pool = get_test_pool().await;
        create_test_table(&pool).await;

        let affected = insert_account(
            &pool,
            &[
                TypedValue::new("INTEGER", 1).into(),
                TypedValue::new("VARCHAR", "Ada").into(),
                TypedValue::new("DECIMAL", 120.5f64).into(),
                TypedValue::new("DATE", "2024-02-29").into(),
            ],
        )
        .await?;
        assert_eq!(affected, 1);

        insert_account(
            &pool,
            &[
                TypedValue::new("INTEGER", 2).into(),
                TypedValue::new("VARCHAR", "Grace").into(),
                TypedValue::null("DECIMAL").into(),
                TypedValue::null("DATE").into(),
            ],
        )
        .await?;

        let mut call = postgres::call(
            &pool,
            "SELECT id, owner, balance, opened FROM marshal_accounts WHERE id = ANY($1) ORDER BY id",
            &[TypedValue::new("ARRAY", ArrayValue::typed(
                "INTEGER",
                vec![TypedValue::new("INTEGER", 1), TypedValue::new("INTEGER", 2)],
            ))
            .into()],
            vec![account_shape()],
        )
        .await?;

        assert!(call.next_query_result()?);
        let rows: Vec<_> = call.take_query_result().unwrap().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("owner"), Some(&Value::Text("Ada".into())));
        assert_eq!(rows[0].get("balance"), Some(&Value::Decimal(Decimal::new(12050, 2))));
        assert_eq!(
            rows[0].get("opened"),
            Some(&sqlx_marshal::IntoValue::into_value(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(rows[1].get("balance"), None);

        assert!(!call.next_query_result()?);
        assert_eq!(call.state(), CursorState::ExecutionSummary);
        call.close()?;

        Ok(())
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn test_unmapped_column_fails_on_advance() -> Result<(), Box<dyn std::error::Error>> {
        let pool = get_test_pool().await;

        let shape = Arc::new(RecordType::new("Narrow", vec![FieldDef::new("a", FieldKind::Int)]));
        let mut call = postgres::call(&pool, "SELECT 1::int4 AS a, 2::int4 AS b", &[], vec![shape]).await?;

        let err = call.next_query_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
        assert!(err.to_string().contains("'b'"));

        Ok(())
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn test_server_error_is_database_error() -> Result<(), Box<dyn std::error::Error>> {
        let pool = get_test_pool().await;

        let result = postgres::call(&pool, "SELECT * FROM marshal_missing_table", &[], vec![]).await;
        let err = match result {
            Ok(_) => panic!("query against a missing table should fail"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::Database);

        Ok(())
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn test_null_time_with_timezone_targets_timetz_column() -> Result<(), Box<dyn std::error::Error>> {
        let pool = get_test_pool().await;

        sqlx::query("DROP TABLE IF EXISTS marshal_shifts")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE TABLE marshal_shifts (id INTEGER PRIMARY KEY, starts TIMETZ)")
            .execute(&pool)
            .await?;

        let mut call = postgres::call(
            &pool,
            "INSERT INTO marshal_shifts (id, starts) VALUES ($1, $2)",
            &[
                TypedValue::new("INTEGER", 1).into(),
                TypedValue::null("TIME WITH TIMEZONE").into(),
            ],
            vec![],
        )
        .await?;
        assert!(!call.next_query_result()?);
        assert_eq!(call.execution_result().map(|s| s.affected_row_count), Some(1));

        Ok(())
    }

    #[test]
    fn test_parameters_bind_without_database() {
        let params = PgParameters::bind(&[
            TypedValue::new("BIGINT", 5i64).into(),
            TypedValue::new("TIMESTAMP", "2024-01-01 10:00:00").into(),
        ])
        .unwrap();
        assert_eq!(params.len(), 2);

        let err = PgParameters::bind(&[TypedValue::new("INTEGER", "five").into()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
    }
}
