//! fieldtrace: CLI companion for the tracking agent.
//!
//! ## Subcommands
//!
//! - `login`: authenticate and persist the session the daemon tracks under
//! - `logout`: clear the persisted session
//! - `status`: show permission readiness and the current identity
//! - `profile`: fetch the logged-in user's profile from the remote service

mod logging;

use clap::{Parser, Subcommand};
use tracing::error;

use fieldtrace_core::permissions::{PermissionGate, PlatformGate};
use fieldtrace_core::remote::RemoteClient;
use fieldtrace_core::session::SessionStore;
use fieldtrace_core::{AgentConfig, StorageConfig};

#[derive(Parser)]
#[command(name = "fieldtrace")]
#[command(about = "Fieldtrace location-tracking agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate against the remote service and persist the session
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long)]
        password: String,
    },

    /// Clear the persisted session
    Logout,

    /// Show permission readiness and the current identity
    Status,

    /// Fetch the logged-in user's profile
    Profile,
}

fn main() {
    let storage = StorageConfig::default();
    let _logging_guard = logging::init(&storage);
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login { email, password } => login(&storage, &email, &password),
        Commands::Logout => logout(&storage),
        Commands::Status => status(&storage),
        Commands::Profile => profile(&storage),
    };

    if let Err(err) = result {
        error!(error = %err, "fieldtrace command failed");
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn login(storage: &StorageConfig, email: &str, password: &str) -> Result<(), String> {
    let config = AgentConfig::load(storage);
    let client = RemoteClient::new(&config);

    let session = client
        .login(email, password)
        .map_err(|err| err.to_string())?;
    SessionStore::new(storage.clone())
        .save(&session)
        .map_err(|err| err.to_string())?;

    println!("Logged in as {} (user {})", session.user_name, session.user_id);
    Ok(())
}

fn logout(storage: &StorageConfig) -> Result<(), String> {
    SessionStore::new(storage.clone())
        .clear()
        .map_err(|err| err.to_string())?;
    println!("Logged out");
    Ok(())
}

fn status(storage: &StorageConfig) -> Result<(), String> {
    let readiness = PlatformGate::new(storage.clone()).check_readiness();
    let session = SessionStore::new(storage.clone()).load();

    println!(
        "Location services: {}",
        if readiness.services_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "Foreground permission: {}",
        if readiness.foreground_granted {
            "granted"
        } else {
            "not granted"
        }
    );
    println!(
        "Background permission: {}",
        if readiness.background_granted {
            "granted"
        } else {
            "not granted"
        }
    );
    match session {
        Some(session) => println!("Session: {} (user {})", session.user_name, session.user_id),
        None => println!("Session: not logged in"),
    }
    Ok(())
}

fn profile(storage: &StorageConfig) -> Result<(), String> {
    let session = SessionStore::new(storage.clone())
        .load()
        .ok_or_else(|| "Not logged in".to_string())?;

    let config = AgentConfig::load(storage);
    let client = RemoteClient::new(&config);
    let profile = client
        .fetch_user(&session.user_id)
        .map_err(|err| err.to_string())?;

    println!(
        "{}",
        serde_json::to_string_pretty(&profile).unwrap_or_else(|_| profile.to_string())
    );
    Ok(())
}
