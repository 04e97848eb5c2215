//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `estateguard_core` linkage.
//! - `demo` runs one guard shift against the in-memory backend.

use clap::{Parser, Subcommand};
use estateguard_core::backend::memory::MemoryBackend;
use estateguard_core::backend::BackendHandle;
use estateguard_core::db::open_db_in_memory;
use estateguard_core::service::{
    AdminService, AuthService, ClockRequest, ClockService, IncidentDraft, IncidentService,
    Notifier,
};
use estateguard_core::{init_from_config, CoreConfig, GeoPoint, IncidentSeverity, SyncedStore};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEMO_PASSWORD: &str = "demo-password";

/// EstateGuard core smoke runner
#[derive(Parser, Debug)]
#[command(name = "estateguard", version, long_about = None)]
struct Cli {
    /// JSON core config; `ESTATEGUARD_*` variables apply on top
    #[arg(global = true, long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Seed demo users, clock a guard in and report an incident
    Demo {
        #[arg(long, default_value = DEMO_PASSWORD)]
        password: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("estateguard_core ping={}", estateguard_core::ping());
    println!("estateguard_core version={}", estateguard_core::core_version());

    let Some(Command::Demo { password }) = cli.command else {
        return ExitCode::SUCCESS;
    };
    match load_config(cli.config).and_then(|config| run_demo(&config, &password)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<CoreConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::from_env()?,
    };
    if init_from_config(&config)? {
        println!("demo logging=file");
    }
    Ok(config)
}

fn run_demo(config: &CoreConfig, password: &str) -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let backend = BackendHandle::from_shared(Arc::new(MemoryBackend::new()));
    let store = SyncedStore::new(&conn, backend.documents.clone());

    let auth = AuthService::new(store.clone(), backend.auth.clone());
    let seeded = auth.seed_demo_users(password)?;
    println!("demo seeded_users={}", seeded.len());

    let admin = auth.sign_in("admin@estateguard.com", password)?;
    auth.register_push_token(&admin.id, "demo-admin-token")?;
    let guard = auth.sign_in("guard@estateguard.com", password)?;

    let clock = ClockService::new(store.clone(), config);
    let position = Some(GeoPoint::new(-26.2041, 28.0473));
    let record = clock.record_clock(&guard.id, ClockRequest::qr("ESTATE-GATE-01", position))?;
    println!(
        "demo clock status={} location={}",
        record.status.label(),
        record.entry.location.unwrap_or_default()
    );

    let admin_settings = AdminService::new(store.clone(), config);
    let incidents = IncidentService::new(
        store.clone(),
        backend.storage.clone(),
        Notifier::new(backend.documents.clone(), backend.messaging.clone()),
        admin_settings.load_settings(),
    );
    let submission = incidents.submit_incident(
        &guard.id,
        IncidentDraft {
            description: "Perimeter fence cut near the east gate".to_string(),
            severity: IncidentSeverity::High,
            location: position,
            photo: None,
        },
    )?;
    println!(
        "demo incident severity={} notified_admins={}",
        submission.incident.severity.as_str(),
        submission.notified_admins
    );

    let snapshot = admin_settings.dashboard(estateguard_core::time::now_epoch_ms())?;
    println!(
        "demo dashboard users={} incidents={} on_duty={} pending_sync={}",
        snapshot.total_users,
        snapshot.total_incidents,
        snapshot.guards_on_duty.len(),
        store.pending_count()?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, DEMO_PASSWORD};
    use clap::Parser;

    #[test]
    fn no_subcommand_is_a_smoke_run() {
        let cli = Cli::try_parse_from(["estateguard"]).expect("bare invocation parses");
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn demo_takes_defaults_and_global_config() {
        let cli = Cli::try_parse_from(["estateguard", "demo", "--config", "/etc/guard.json"])
            .expect("demo parses");
        assert_eq!(
            cli.command,
            Some(Command::Demo {
                password: DEMO_PASSWORD.to_string()
            })
        );
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/guard.json")));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["estateguard", "serve"]).is_err());
    }
}
