//! permsync - mirror Google Drive sharing rules as document access records
//!
//! Runs one permission sync and writes each document's access record to
//! stdout as a JSON line. The sync watermark is persisted in the config
//! directory so the next run only looks at files changed since.

use anyhow::{Context, Result};
use clap::Parser;
use drive::{
    DriveClient, DriveConfig, DriveCredentials, PermissionCache, RunState, SyncCallback,
    SyncError, SyncScope, SyncState, doc_sync,
};
use log::{error, info, warn};
use std::cell::Cell;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Sync state filename in the config directory
const SYNC_STATE_FILE: &str = "sync-state.json";

#[derive(Parser)]
#[command(name = "permsync", version, about = "Sync Google Drive document permissions")]
struct Args {
    /// Google credentials JSON (service account or authorized user)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Connector settings JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore the stored watermark and sync every document
    #[arg(long)]
    full: bool,

    /// Stop after emitting this many documents
    #[arg(long)]
    max_docs: Option<usize>,
}

/// Counts emitted documents and asks the run to stop at the limit
struct CliCallback {
    limit: Option<usize>,
    emitted: Cell<usize>,
}

impl SyncCallback for CliCallback {
    fn should_stop(&self) -> bool {
        self.limit.is_some_and(|limit| self.emitted.get() >= limit)
    }

    fn progress(&self, _label: &str, count: usize) {
        let emitted = self.emitted.get() + count;
        self.emitted.set(emitted);
        if emitted % 1000 == 0 {
            info!("{} documents synced", emitted);
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let drive_config = match &args.config {
        Some(path) => DriveConfig::from_file(path)?,
        None => DriveConfig::load().inspect_err(|_| {
            if let Some(path) = DriveConfig::default_config_path() {
                warn!(
                    "To configure the connector, either:\n\
                     1. Place connector settings at: {}\n\
                     2. Or set PERMSYNC_PRIMARY_ADMIN_EMAIL (and optionally PERMSYNC_COMPANY_DOMAIN)",
                    path.display()
                );
            }
        })?,
    };

    let credentials = match &args.credentials {
        Some(path) => DriveCredentials::from_file(path)?,
        None => DriveCredentials::load().inspect_err(|_| {
            if let Some(path) = DriveCredentials::default_credentials_path() {
                warn!(
                    "To configure Drive access, either:\n\
                     1. Place a Google credentials file at: {}\n\
                     2. Or set GOOGLE_APPLICATION_CREDENTIALS to its path",
                    path.display()
                );
            }
        })?,
    };
    if !credentials.supports_delegation() {
        warn!("Authorized-user credentials cannot act as file owners; lookups use that user's view");
    }

    let previous = if args.full {
        None
    } else {
        load_sync_state(&drive_config.primary_admin_email)
    };

    let scope = SyncScope::new(drive_config, credentials).with_state(previous.as_ref());
    let client = DriveClient::from_scope(&scope);
    let cache = Arc::new(PermissionCache::new());
    let callback = CliCallback {
        limit: args.max_docs,
        emitted: Cell::new(0),
    };

    let mut sync = doc_sync(client, &scope, Arc::clone(&cache), Some(&callback))?;
    let mut out = BufWriter::new(std::io::stdout().lock());

    for result in sync.by_ref() {
        match result {
            Ok(record) => {
                serde_json::to_writer(&mut out, &record).context("Failed to write access record")?;
                out.write_all(b"\n")?;
            }
            Err(SyncError::Cancelled) => {
                info!("Stopped after {} documents", callback.emitted.get());
            }
            Err(e) => return Err(e.into()),
        }
    }
    out.flush()?;
    info!("{} permissions cached", cache.len());

    // Only a complete run moves the watermark
    if sync.state() == RunState::Done {
        let state = SyncState::new(scope.config.primary_admin_email.clone())
            .completed_at(sync.window().end);
        config::save_json(SYNC_STATE_FILE, &state)?;
        info!("Saved sync watermark {}", sync.window().end);
    }

    Ok(())
}

/// Load the stored watermark, ignoring state written for another connection
fn load_sync_state(connection_id: &str) -> Option<SyncState> {
    if !config::config_exists(SYNC_STATE_FILE) {
        return None;
    }

    match config::load_json::<SyncState>(SYNC_STATE_FILE) {
        Ok(state) if state.connection_id == connection_id => Some(state),
        Ok(state) => {
            warn!(
                "Ignoring sync state for {}, running a full sync for {}",
                state.connection_id, connection_id
            );
            None
        }
        Err(e) => {
            warn!("Failed to load sync state, running a full sync: {:#}", e);
            None
        }
    }
}
