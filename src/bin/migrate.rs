use receipt_service::config::Config;
use receipt_service::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let config = Config::load()?;
    println!("Database file: {}", config.database.path.display());

    let pool = db::init_pool(&config.database.path, 1).await?;
    db::run_migrations(&pool).await?;

    println!("Migration complete.");
    Ok(())
}
