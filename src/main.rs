#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use contact_messenger::api::ApiClient;
use contact_messenger::clock::{SystemClock, TickSource};
use contact_messenger::config::AppConfig;
use contact_messenger::contacts::ContactBook;
use contact_messenger::export::{default_export_name, export_contacts, ExportFormat};
use contact_messenger::logging::{init_logging, OperationTimer};
use contact_messenger::models::{Contact, ContactFilter, Counterpart, Message, MessageId, SortOrder, UserId};
use contact_messenger::polling::{ConversationDriver, ConversationEvent, UnreadBadge};
use contact_messenger::repository::MessageStore;
use contact_messenger::session::{Session, TokenStore};
use contact_messenger::timestamp::{format_relative, RelativeFormatter};
use contact_messenger::validation::InputValidator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/default, config/local and config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Create an account and store the session token
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored session token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List contacts
    Contacts {
        /// Substring to search for in name, email or phone
        #[arg(short, long)]
        search: Option<String>,

        /// Sort order (name, favorites or frequent)
        #[arg(long, default_value = "name")]
        sort: String,

        /// Only show this group
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Find likely duplicate contacts
    Duplicates {
        /// Merge every reported group, keeping the first contact of each
        #[arg(long)]
        merge: bool,
    },
    /// Export contacts to a file
    Export {
        /// Output format (json or csv)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (defaults to contacts_YYYY-MM-DD.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import contacts from a JSON file
    Import {
        /// JSON file holding an array of contacts
        file: PathBuf,
    },
    /// Show the total number of unread messages
    Unread,
    /// List conversations, most recent first
    Conversations,
    /// Open a conversation and chat interactively
    Chat {
        /// Email of the other user
        #[arg(short, long)]
        email: String,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    let _log_guard = init_logging(
        Some(&config.get_log_level()),
        config.log_file().as_deref(),
        config.logging.format == "json",
    )?;

    info!("Starting contact-messenger");

    // One thread: timer callbacks and network completions interleave, never run in parallel
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli.command, &config))
}

async fn run(command: Commands, config: &AppConfig) -> Result<()> {
    let tokens = TokenStore::from_config(&config.session)?;
    let client = ApiClient::new(&config.api.base_url, config.request_timeout())?;

    match command {
        Commands::Login { email, password } => {
            let session = Session::login(&tokens, &client, &email, &password)
                .await
                .context("Login failed")?;
            println!("Logged in as {} <{}>", session.user().name, session.user().email);
        },
        Commands::Register { name, email, password } => {
            InputValidator::validate_contact_name(&name)?;
            InputValidator::validate_email(&email)?;
            let session = Session::register(&tokens, &client, &name, &email, &password)
                .await
                .context("Registration failed")?;
            println!("Registered {} <{}>", session.user().name, session.user().email);
        },
        Commands::Logout => {
            tokens.clear()?;
            println!("Logged out");
        },
        command => {
            let client = client.with_token(tokens.require()?);
            let session = Session::resume(&tokens, &client)
                .await
                .context("Could not resume session; log in again")?;
            run_authenticated(command, config, Arc::new(client), &session).await?;
        },
    }

    Ok(())
}

async fn run_authenticated(command: Commands, config: &AppConfig, client: Arc<ApiClient>, session: &Session) -> Result<()> {
    match command {
        Commands::Whoami => {
            let user = session.user();
            println!("{} <{}> (id {})", user.name, user.email, user.id);
        },
        Commands::Contacts { search, sort, group } => {
            list_contacts(client, search, &sort, group).await?;
        },
        Commands::Duplicates { merge } => {
            find_duplicates(client, merge).await?;
        },
        Commands::Export { format, output } => {
            let format: ExportFormat = format.parse()?;
            let mut book = ContactBook::new(client);
            book.load().await?;

            let path = output.unwrap_or_else(|| PathBuf::from(default_export_name(format, Local::now().date_naive())));
            export_contacts(book.all(), format, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} contacts to {}", book.all().len(), path.display());
        },
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let mut book = ContactBook::new(client);
            book.load().await?;
            let summary = book.import(&json).await?;
            println!(
                "Imported {} contacts. {} skipped (duplicates or invalid).",
                summary.imported, summary.skipped
            );
        },
        Commands::Unread => {
            let total = client.fetch_unread_total().await?;
            println!("{total} unread");
        },
        Commands::Conversations => {
            list_conversations(&client).await?;
        },
        Commands::Chat { email } => {
            chat(config, client, session, &email).await?;
        },
        Commands::Login { .. } | Commands::Register { .. } | Commands::Logout => {},
    }

    Ok(())
}

fn contact_line(contact: &Contact) -> String {
    let star = if contact.is_favorite { "*" } else { " " };
    let phone = contact.phone.as_deref().unwrap_or("-");
    let group = contact.group.as_deref().unwrap_or("-");
    format!("{:>5} {star} {:<24} {:<32} {:<16} {group}", contact.id, contact.name, contact.email, phone)
}

/// List contacts with the frequent and recent shortlists
async fn list_contacts(client: Arc<ApiClient>, search: Option<String>, sort: &str, group: Option<String>) -> Result<()> {
    let sort: SortOrder = sort.parse()?;
    let mut book = ContactBook::new(client);
    book.load().await?;
    book.set_filter(ContactFilter { search, sort, group });

    let frequent = book.frequent();
    if !frequent.is_empty() {
        println!("Frequently contacted:");
        for contact in frequent {
            println!("  {} ({} views)", contact.name, contact.access_count);
        }
    }

    let recent = book.recent(Utc::now());
    if !recent.is_empty() {
        println!("Recently added:");
        for contact in recent {
            println!("  {}", contact.name);
        }
    }

    let visible = book.visible();
    println!("{} of {} contacts", visible.len(), book.all().len());
    for contact in visible {
        println!("{}", contact_line(contact));
    }
    Ok(())
}

/// Report duplicate groups, optionally merging them all
async fn find_duplicates(client: Arc<ApiClient>, merge: bool) -> Result<()> {
    let mut book = ContactBook::new(Arc::clone(&client));
    book.load().await?;

    let mut report = book.duplicates();
    if report.is_empty() {
        println!("No duplicates found");
        return Ok(());
    }

    for group in report.groups() {
        let [first, second] = &group.contacts;
        println!(
            "{} match on \"{}\": {} (id {}) / {} (id {})",
            group.kind, group.value, first.name, first.id, second.name, second.id
        );
    }

    if !merge {
        return Ok(());
    }

    let timer = OperationTimer::new("merge_duplicates");
    let mut merged = 0;
    while !report.is_empty() {
        match report.merge(0, client.as_ref()).await {
            Ok(kept) => {
                merged += 1;
                debug!(kept = kept.id, "Merged group");
            },
            Err(e) => {
                // Usually the second contact went away with an earlier group
                warn!(error = %e, "Skipping duplicate group");
                report.dismiss(0);
            },
        }
    }
    timer.finish();

    book.load().await?;
    println!("Merged {merged} groups; {} contacts remain", book.all().len());
    Ok(())
}

async fn list_conversations(client: &ApiClient) -> Result<()> {
    let now = Utc::now();
    let conversations = client.fetch_conversations().await?;
    if conversations.is_empty() {
        println!("No conversations yet");
    }
    for summary in conversations {
        let unread = if summary.unread_count > 0 {
            format!(" [{} unread]", summary.unread_count)
        } else {
            String::new()
        };
        let last = summary
            .last_message
            .as_ref()
            .map(|m| format!("{} ({})", m.text, format_relative(&m.timestamp, now)))
            .unwrap_or_default();
        println!("{} <{}>{unread}: {last}", summary.contact_name, summary.contact_email);
    }
    Ok(())
}

fn time_labels(messages: &[Message], formatter: &RelativeFormatter<Local>, now: DateTime<Utc>) -> Vec<String> {
    formatter.labels(messages.iter().map(|m| m.timestamp.as_str()), now)
}

/// Print the conversation and return the time labels shown
async fn render(
    driver: &ConversationDriver<ApiClient>, formatter: &RelativeFormatter<Local>, now: DateTime<Utc>, me: UserId,
) -> Vec<String> {
    let messages = driver.messages().await;
    let labels = time_labels(&messages, formatter, now);
    for (message, label) in messages.iter().zip(&labels) {
        let who = if message.is_from(me) {
            "You"
        } else {
            message
                .sender_name
                .as_deref()
                .or(message.sender_email.as_deref())
                .unwrap_or("Them")
        };
        println!("#{:<6} [{label}] {who}: {}", message.id, message.text);
    }
    labels
}

/// Interactive conversation: polls in the background, sends what is typed on stdin
async fn chat(config: &AppConfig, client: Arc<ApiClient>, session: &Session, email: &str) -> Result<()> {
    InputValidator::validate_email(email)?;
    let me = session.user_id();
    let formatter = RelativeFormatter::local();

    let (mut driver, mut events) =
        ConversationDriver::new(Arc::clone(&client), session, config.polling.conversation_interval());
    let mut badge = UnreadBadge::spawn(Arc::clone(&client), session, config.polling.unread_interval());
    let (mut now, clock) = TickSource::spawn(Arc::new(SystemClock), config.polling.clock_interval());
    let mut clock_running = true;
    let mut shown = Vec::new();

    if let Err(e) = driver.open(Counterpart::new(email)).await {
        println!("Could not load conversation: {e}");
    }
    println!("Chatting with {email}. Type a message, /delete <id>, or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ConversationEvent::Loaded { .. } | ConversationEvent::NewContent { .. }) => {
                    shown = render(&driver, &formatter, now.get(), me).await;
                },
                Some(ConversationEvent::UnreadChanged { unread, .. }) => debug!(unread, "Conversation unread count"),
                Some(ConversationEvent::FocusInput) => debug!("Ready for input"),
                Some(ConversationEvent::Closed { .. }) | None => break,
            },
            ticked = now.changed(), if clock_running => {
                if !ticked {
                    clock_running = false;
                    continue;
                }
                // Only reprint when a visible label moved to its next bucket
                let messages = driver.messages().await;
                if time_labels(&messages, &formatter, now.get()) != shown {
                    shown = render(&driver, &formatter, now.get(), me).await;
                }
            },
            changed = badge.changed() => {
                if changed {
                    println!("({} unread across all conversations)", badge.count());
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "/quit" {
                    break;
                }
                if let Some(id) = line.strip_prefix("/delete") {
                    match id.trim().parse::<MessageId>() {
                        Ok(id) => {
                            if let Err(e) = driver.delete_message(id).await {
                                println!("Could not delete message: {e}");
                            }
                        },
                        Err(_) => println!("Usage: /delete <id>"),
                    }
                    continue;
                }
                if let Err(e) = driver.send(line).await {
                    error!(error = %e, "Send failed");
                    println!("Could not send message: {e}");
                }
            },
        }
    }

    driver.close().await;
    badge.stop();
    clock.join().await;
    info!("Chat closed");
    Ok(())
}
