/// Migrating twice must be idempotent.
///
/// DB-backed test, skipped if RBK_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(rbk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: RBK_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    rbk_db::migrate(&pool).await?;
    rbk_db::migrate(&pool).await?;

    let st = rbk_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_reservations_table);

    Ok(())
}
