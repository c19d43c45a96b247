use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use missionary::models::access::AccessLevel;
use missionary::models::resource::{GroupKind, MissionKind, Resource, ResourceKind};
use missionary::services::{ResourceService, UserDirectory};
use missionary::store::SqliteResourceStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "missionary maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Mission,
    Group,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// List the members of a mission or group with their access level
    Members { kind: Kind, id: Uuid },
    /// Print the access level a user holds on a mission or group
    Access { kind: Kind, id: Uuid, user: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Members { kind, id } => {
            let pool = get_pool().await?;
            match kind {
                Kind::Mission => print_members(&service::<MissionKind>(pool).get(id).await?),
                Kind::Group => print_members(&service::<GroupKind>(pool).get(id).await?),
            }
        }
        Commands::Access { kind, id, user } => {
            let pool = get_pool().await?;
            let level = match kind {
                Kind::Mission => service::<MissionKind>(pool).access_level_of(id, &user).await?.to_string(),
                Kind::Group => service::<GroupKind>(pool).access_level_of(id, &user).await?.to_string(),
            };
            println!("{level}");
        }
    }

    Ok(())
}

fn service<K: ResourceKind>(pool: SqlitePool) -> ResourceService<K> {
    ResourceService::new(
        Arc::new(SqliteResourceStore::<K>::new(pool.clone())),
        Arc::new(UserDirectory::new(pool)),
    )
}

fn print_members<K: ResourceKind>(resource: &Resource<K>) {
    println!("{} '{}' ({})", K::NAME, resource.name, resource.id);
    println!("{:<8} {:<8} {}", "Ordinal", "Level", "User");
    for member in &resource.members {
        println!("{:<8} {:<8} {}", member.level.ordinal(), member.level.to_string(), member.user_id);
    }
    if !resource.join_requests.is_empty() {
        println!("pending: {}", resource.join_requests.join(", "));
    }
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when run from the repo root, else the crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
