use clap::{Parser, Subcommand};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use erp_api::{
    config,
    db,
    entities::operator::OperatorRole,
    migrator::Migrator,
    services::operators::{CreateOperatorInput, OperatorService},
};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "migration", about = "Manage the ERP database schema")]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Roll back the given number of migrations (all when omitted)
    Down {
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Drop every table and re-apply all migrations
    Fresh,
    /// Print applied and pending migrations
    Status,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Generated and printed once when omitted
        #[arg(long, env = "ERP_ADMIN_PASSWORD")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    info!("Connecting to database");
    let pool = db::establish_connection_from_app_config(&cfg).await?;

    match cli.command {
        Command::Up => {
            Migrator::up(&pool, None).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&pool, steps).await?;
            info!("Migrations rolled back");
        }
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("Schema recreated");
        }
        Command::Status => {
            Migrator::status(&pool).await?;
        }
        Command::CreateAdmin {
            email,
            name,
            password,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(|| {
                thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(24)
                    .map(char::from)
                    .collect()
            });
            let operators = OperatorService::new(Arc::new(pool));
            let admin = operators
                .create_operator(CreateOperatorInput {
                    name,
                    email,
                    password: password.clone(),
                    role: OperatorRole::Admin,
                })
                .await?;
            info!(operator_id = %admin.id, email = %admin.email, "Administrator created");
            if generated {
                println!("Generated password for {}: {}", admin.email, password);
            }
        }
    }

    Ok(())
}
