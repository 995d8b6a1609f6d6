//! WhisperChain command-line front end.
//!
//! Thin shell over `whisper-core`: parses arguments, authenticates the
//! caller against the user table, checks the role gate, then invokes
//! exactly one core operation. Authorization denial is a printed
//! refusal and a non-zero exit, not an error from the core.

mod auth;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use whisper_common::identity::{Permission, Role};
use whisper_core::access::AccessControl;
use whisper_core::audit::{AuditSink, JsonAuditLog};
use whisper_core::messaging::MessagingService;
use whisper_core::store::{Stores, Table};

use auth::UserStore;

#[derive(Parser)]
#[command(name = "whisper", about = "WhisperChain anonymous messaging CLI")]
struct Cli {
    /// Directory holding the JSON tables and the audit log.
    #[arg(long, default_value = "db")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new user.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// User role: Sender, Receiver or Moderator.
        #[arg(long)]
        role: Role,
        /// Campus email address (@dartmouth.edu).
        #[arg(long)]
        email: String,
    },
    /// Verify credentials.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Get a single-use anonymity token (Senders only).
    GetToken {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Send an anonymous message (Senders only).
    Send {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        receiver: String,
    },
    /// View your mailbox (Receivers and Moderators).
    View {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Mark every listed unread message as read.
        #[arg(long)]
        mark_read: bool,
    },
    /// Flag a message for review (Moderators only).
    Flag {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        message_id: u64,
    },
    /// Show the permissions granted to a user.
    Permissions {
        #[arg(long)]
        username: String,
    },
    /// List audit events, optionally filtered by type.
    Audit {
        #[arg(long)]
        event_type: Option<String>,
    },
}

struct App {
    users: Arc<UserStore>,
    access: AccessControl,
    service: MessagingService,
    audit: Arc<JsonAuditLog>,
}

impl App {
    fn open(data_dir: &Path) -> Result<Self> {
        let stores = Stores::open(data_dir)?;
        let users = Arc::new(UserStore::new(Arc::new(Table::open(
            "users",
            data_dir.join("users.json"),
        )?)));
        let audit = Arc::new(JsonAuditLog::new(data_dir.join("audit_log.jsonl")));
        let access = AccessControl::new(users.clone());
        let service = MessagingService::new(&stores, audit.clone());
        Ok(Self {
            users,
            access,
            service,
            audit,
        })
    }

    /// Authenticate, then check the role gate for a gated operation.
    fn require(&self, username: &str, password: &str, permission: Permission) -> Result<()> {
        if !self.users.login(username, password)? {
            bail!("invalid credentials");
        }
        if !self.access.authorize(username, permission) {
            bail!("permission denied: {username} may not {permission}");
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app = App::open(&cli.data_dir)?;

    match cli.command {
        Command::Register {
            username,
            password,
            role,
            email,
        } => {
            app.users.register(&username, &password, role, &email)?;
            // Receivers need a mailbox before anyone can send to them.
            if role == Role::Receiver {
                app.service.register_receiver(&username)?;
            }
            app.audit.record(
                "registration",
                json!({ "username": username, "role": role, "email": email }),
            );
            println!("User {username} registered successfully!");
        }

        Command::Login { username, password } => {
            if !app.users.login(&username, &password)? {
                bail!("invalid credentials");
            }
            app.audit.record("login", json!({ "username": username }));
            println!("Welcome back, {username}!");
        }

        Command::GetToken { username, password } => {
            app.require(&username, &password, Permission::GetToken)?;
            let token = app.service.issue_token(&username)?;
            println!("Your anonymous token: {}", token.value);
        }

        Command::Send {
            username,
            password,
            token,
            message,
            receiver,
        } => {
            app.require(&username, &password, Permission::SendMessage)?;
            let message_id = app.service.send(&username, &token, &message, &receiver)?;
            println!("Message sent successfully! (ID: {message_id})");
        }

        Command::View {
            username,
            password,
            mark_read,
        } => {
            app.require(&username, &password, Permission::ViewMessages)?;
            let views = app.service.list_messages(&username)?;
            if views.is_empty() {
                println!("No messages available.");
            } else {
                println!("Your messages:");
                for view in &views {
                    let status = if view.read { "read" } else { "unread" };
                    let flagged = if view.flagged { " [flagged]" } else { "" };
                    println!();
                    println!("[{status}] Message ID: {}{flagged}", view.message_id);
                    println!("Content: {}", view.content);
                    println!("Received: {}", view.received_at);
                    if mark_read && !view.read {
                        app.service.mark_read(&username, view.message_id)?;
                        println!("(Marked as read)");
                    }
                }
            }
        }

        Command::Flag {
            username,
            password,
            message_id,
        } => {
            app.require(&username, &password, Permission::FlagMessage)?;
            let flag_id = app.service.flag(&username, message_id)?;
            println!("Message flagged successfully! (Flag ID: {flag_id})");
        }

        Command::Permissions { username } => {
            let granted = app.access.permissions_of(&username);
            if granted.is_empty() {
                println!("{username} has no granted permissions.");
            } else {
                for permission in granted {
                    println!("{permission}");
                }
            }
        }

        Command::Audit { event_type } => {
            for event in app.audit.events(event_type.as_deref(), None, None) {
                println!(
                    "{} {} {}",
                    event.timestamp.to_rfc3339(),
                    event.event_type,
                    event.data
                );
            }
        }
    }

    Ok(())
}
