use customer_store::{CustomerDirectory, DbService, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 配置, 日志)
    let config = setup_environment()?;
    tracing::info!(
        environment = %config.environment,
        backend = ?config.backend,
        "Customer store starting"
    );

    // 2. 打开存储
    let db = DbService::open(&config)?;
    let repo = db.customers();
    let total = repo.count(true).await?;
    let active = repo.count(false).await?;
    tracing::info!(
        backend = db.backend().name(),
        total,
        active,
        deleted = total - active,
        "Customer store ready"
    );

    // 3. 检查旧格式 ID
    let directory = CustomerDirectory::new(&db, &config);
    if directory.migration_needed().await? {
        if config.migrate_on_startup {
            let report = directory.migrate().await?;
            tracing::info!(
                migrated = report.migrated,
                batches = report.batches,
                counter = ?report.last_issued,
                "Customer id migration finished"
            );
        } else {
            tracing::warn!("Legacy customer ids found; set MIGRATE_ON_STARTUP=true to renumber them");
        }
    } else {
        tracing::info!("Customer ids are up to date");
    }

    Ok(())
}
