//! Argus - a headless Gmail dashboard daemon
//!
//! Polls Gmail for mailbox deltas, mirrors label associations and SLA
//! tracking rows into a local SQLite store, and keeps a rolling stats
//! history. This binary is the composition root: it builds the client and
//! store once and hands them to the engines.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use desk::{
    ActionHandler, DeskStore, GmailAuth, GmailClient, GmailCredentials, MessageId, SqliteDeskStore,
};

mod daemon;
mod notify;
mod refresh;
mod settings;

use daemon::{Daemon, DaemonOptions};
use settings::DaemonSettings;

const DB_FILE: &str = "argus.sqlite";

const USAGE: &str = "\
Usage: argus [COMMAND] [OPTIONS]

Commands:
  (none)             Run the sync daemon
  resolve <id>       Mark a tracked SLA email resolved
  untrack <id>       Stop tracking an SLA email
  logout             Discard stored OAuth tokens and exit

Options (daemon only):
  --once             Run every engine once and exit
  --force-sla-sync   Re-run the SLA sync even if one already completed
  --trigger-webhook  Fire the workflow webhook after the first stats snapshot
  --help             Show this help";

/// What this invocation should do
enum Command {
    Daemon(DaemonOptions),
    Resolve(String),
    Untrack(String),
    Logout,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(usage) => {
            println!("{}", usage);
            return ExitCode::SUCCESS;
        }
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> std::result::Result<Command, &'static str> {
    let mut options = DaemonOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => options.once = true,
            "--force-sla-sync" => options.force_sla = true,
            "--trigger-webhook" => options.trigger_webhook = true,
            "logout" => return Ok(Command::Logout),
            "resolve" => {
                let id = args.next().ok_or(USAGE)?;
                return Ok(Command::Resolve(id));
            }
            "untrack" => {
                let id = args.next().ok_or(USAGE)?;
                return Ok(Command::Untrack(id));
            }
            _ => return Err(USAGE),
        }
    }

    Ok(Command::Daemon(options))
}

fn run(command: Command) -> Result<()> {
    // Load Gmail credentials from config file or environment
    let credentials = match GmailCredentials::load() {
        Ok(creds) => creds,
        Err(e) => {
            warn!("Gmail credentials not found: {}", e);
            if let Some(path) = GmailCredentials::default_credentials_path() {
                warn!(
                    "To configure Gmail access, either:\n\
                     1. Place your Google OAuth credentials at: {}\n\
                     2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                    path.display()
                );
            }
            return Err(e.context("Gmail credentials are required"));
        }
    };

    let auth = GmailAuth::new(credentials.client_id, credentials.client_secret)?;
    let gmail = Arc::new(GmailClient::new(auth));

    if let Command::Logout = command {
        gmail.logout()?;
        info!("Stored OAuth tokens removed");
        return Ok(());
    }

    // Opens a browser on first run; later runs refresh silently
    gmail
        .authenticate()
        .context("Gmail authentication failed")?;
    info!("Gmail client initialized successfully");

    let profile = gmail.get_profile().context("Failed to fetch profile")?;
    let user_email = profile.email_address.clone();
    info!("Signed in as {}", user_email);

    let data_dir = config::ensure_data_dir()?;
    let store: Arc<dyn DeskStore> = Arc::new(
        SqliteDeskStore::new(data_dir.join(DB_FILE)).context("Failed to open sync database")?,
    );

    match command {
        Command::Daemon(options) => {
            let settings = DaemonSettings::load();
            if settings.webhook_url.is_none() {
                info!("No webhook URL configured; workflow trigger disabled");
            }

            let mut daemon = Daemon::new(gmail, store, user_email, settings);
            daemon.run(&options)
        }
        Command::Resolve(id) => {
            let handler = ActionHandler::new(gmail, store, user_email);
            if handler.resolve_sla(&MessageId::new(id.as_str()))? {
                println!("Resolved {}", id);
            } else {
                println!("No tracked email with id {}", id);
            }
            Ok(())
        }
        Command::Untrack(id) => {
            let handler = ActionHandler::new(gmail, store, user_email);
            if handler.delete_sla(&MessageId::new(id.as_str()))? {
                println!("Stopped tracking {}", id);
            } else {
                println!("No tracked email with id {}", id);
            }
            Ok(())
        }
        Command::Logout => unreachable!("handled before authentication"),
    }
}
