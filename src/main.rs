//! sesame CLI: drive the session manager from a terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sesame::audit::StorageAuditLog;
use sesame::notify::{Notice, Notifier, Severity};
use sesame::storage::{FileStorage, Storage};
use sesame::user::Role;
use sesame::{Config, HttpIdentityApi, SessionManager};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "sesame",
    version,
    about = "Session client for an HTTP identity service"
)]
struct Args {
    /// Identity service base URL (overrides the config file)
    #[arg(long, env = "SESAME_BASE_URL")]
    base_url: Option<String>,

    /// Directory for persisted session state
    #[arg(long, env = "SESAME_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password
    Login {
        email: String,
        #[arg(long, env = "SESAME_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        name: String,
        email: String,
        #[arg(long, env = "SESAME_PASSWORD", hide_env_values = true)]
        password: String,
        /// Requested role: admin or user
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Clear the cached session
    Logout,
    /// Show the cached session
    Whoami,
    /// Show the login audit log
    History,
}

/// Routes notices to stderr for the human at the terminal.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.severity {
            Severity::Info => eprintln!("{}: {}", notice.title, notice.description),
            Severity::Error => eprintln!("error: {}: {}", notice.title, notice.description),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }

    let store: Arc<dyn Storage> = Arc::new(FileStorage::new(config.data_dir()));
    let manager = SessionManager::new(
        Arc::new(HttpIdentityApi::new(&config.base_url)),
        store.clone(),
    )
    .with_notifier(Arc::new(StderrNotifier));
    manager.initialize();

    match args.command {
        Command::Login { email, password } => {
            if !manager.login(&email, &password).await {
                std::process::exit(1);
            }
        }
        Command::Signup {
            name,
            email,
            password,
            role,
        } => {
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("unknown role '{}', expected admin or user", role))?;
            if !manager.signup(&name, &email, &password, role).await {
                std::process::exit(1);
            }
        }
        Command::Logout => manager.logout(),
        Command::Whoami => match manager.current_user() {
            Some(user) => {
                println!("{} <{}> ({})", user.name, user.email, user.role.as_str());
                if manager.auth_token().is_some() {
                    println!("token: present");
                }
            }
            None => println!("not logged in"),
        },
        Command::History => {
            let log = StorageAuditLog::new(store);
            for record in log.read_all()? {
                println!(
                    "{}  {}  {}",
                    record.timestamp.to_rfc3339(),
                    record.user_id,
                    record.email
                );
            }
        }
    }

    Ok(())
}
