//! Tillar - command-line client for the Tillar API
//!
//! Usage:
//!   tillar [OPTIONS] <COMMAND>
//!
//! Options:
//!   -c, --config <PATH>  Path to config file
//!   -v, --verbose        Increase log verbosity
//!   --host <URL>         Override the API host
//!   --ephemeral          Keep the session in memory only

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tillar_client::api::models::{LoginRequest, RegisterRequest};
use tillar_client::config::Config;
use tillar_client::json::{JsonValue, Parameters};
use tillar_client::notify::ActivityNotifier;
use tillar_client::store::{CredentialStore, KeyValueStore, MemoryStore, Preferences, SqliteStore};
use tillar_client::transport::{Method, ReqwestTransport};
use tillar_client::{ApiClient, RequestSpec};

#[derive(Parser, Debug)]
#[command(name = "tillar")]
#[command(author, version, about = "Tillar API client", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TILLAR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// API host, overriding the config file
    #[arg(long, env = "TILLAR_HOST")]
    host: Option<String>,

    /// Keep credentials in memory instead of the preferences database
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a CSRF cookie from the server
    Csrf,

    /// Log in and store the session
    Login {
        username: String,

        /// Password (reads from stdin if not provided)
        #[arg(long, env = "TILLAR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,

        /// Password (reads from stdin if not provided)
        #[arg(long, env = "TILLAR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show the logged-in user
    Whoami,

    /// Exchange the refresh token for a new token pair
    Refresh,

    /// Log out and forget the session
    Logout,

    /// Show the coin balance
    Coins,

    /// List news
    News,

    /// Send a message to an AI bot
    Ask { bot: String, message: String },

    /// Call an arbitrary API path and print the JSON response
    Call {
        /// HTTP method
        #[arg(value_parser = parse_method)]
        method: Method,

        /// Path below the API host, e.g. /api/keycloak/userinfo/
        path: String,

        /// JSON object sent as parameters
        #[arg(long)]
        data: Option<String>,

        /// Send without the bearer token
        #[arg(long)]
        no_auth: bool,

        /// Attach the CSRF token
        #[arg(long)]
        csrf: bool,
    },

    /// Local preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    /// List stored keys (values of secrets are hidden)
    Show,

    /// Set the UI language
    SetLanguage { language: String },
}

fn parse_method(raw: &str) -> Result<Method, String> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::Get),
        "POST" => Ok(Method::Post),
        "PUT" => Ok(Method::Put),
        "PATCH" => Ok(Method::Patch),
        "DELETE" => Ok(Method::Delete),
        other => Err(format!("unsupported method: {other}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tillar_client={log_level},tillar={log_level},warn")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Load configuration
    let mut config = Config::load(args.config.as_ref())?;
    if let Some(host) = args.host {
        config.api.host = host;
    }

    tracing::debug!(config = ?config, "loaded configuration");

    // Initialize components
    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SqliteStore::open(&config.storage.db_path)
                .with_context(|| format!("opening {}", config.storage.db_path.display()))?,
        )
    };

    if let Command::Prefs { action } = &args.command {
        return handle_prefs_command(
            action,
            store.as_ref(),
            &CredentialStore::new(Arc::clone(&store)),
            Preferences::new(Arc::clone(&store)),
        );
    }

    let transport = Arc::new(ReqwestTransport::new(&config.api)?);
    let notifier = Arc::new(ActivityNotifier::new());
    let client = ApiClient::new(
        &config.api,
        transport,
        CredentialStore::new(store),
        notifier.clone(),
    )?;

    // Print backend messages as they are surfaced
    let mut messages = notifier.messages();
    tokio::spawn(async move {
        while let Ok(message) = messages.recv().await {
            eprintln!("server: {message}");
        }
    });

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("received Ctrl+C, cancelling");
                cancel.cancel();
            }
        }
    });

    tokio::select! {
        result = run(&client, args.command, &cancel) => result,
        _ = cancel.cancelled() => anyhow::bail!("cancelled"),
    }
}

async fn run(client: &ApiClient, command: Command, cancel: &CancellationToken) -> anyhow::Result<()> {
    match command {
        Command::Csrf => {
            client.fetch_csrf_token().await?;
            if client.credentials().csrf_token().is_empty() {
                anyhow::bail!("server did not set a csrf cookie");
            }
            println!("csrf token stored");
        }

        Command::Login { username, password } => {
            let password = read_password(password)?;
            ensure_csrf(client).await?;
            let resp = client.login(&LoginRequest { username, password }).await?;
            match resp.user {
                Some(user) => println!("logged in as {}", user.display_name()),
                None => println!("logged in"),
            }
        }

        Command::Register {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let password = read_password(password)?;
            ensure_csrf(client).await?;
            let resp = client
                .register(&RegisterRequest {
                    username,
                    email,
                    password,
                    first_name,
                    last_name,
                })
                .await?;
            println!("{}", resp.message.unwrap_or_else(|| "registered".to_string()));
        }

        Command::Whoami => {
            let resp = client.user_info().await?;
            let Some(user) = resp.user else {
                anyhow::bail!("{}", resp.message.unwrap_or_else(|| "no user in response".into()));
            };
            println!("name:     {}", user.display_name());
            println!("username: {}", user.username.unwrap_or_default());
            println!("email:    {}", user.email.unwrap_or_default());
        }

        Command::Refresh => {
            let state = client.refresh_session().await;
            println!("{state:?}");
        }

        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }

        Command::Coins => {
            let resp = client.coins_balance().await?;
            println!("{}", resp.balance());
        }

        Command::News => {
            let resp = client.news_list().await?;
            if resp.items().is_empty() {
                eprintln!("no news");
            }
            for item in resp.items() {
                let title = item
                    .translation
                    .as_ref()
                    .and_then(|t| t.title.as_deref())
                    .unwrap_or("(untitled)");
                println!("{:<6} {}", item.id, title);
            }
        }

        Command::Ask { bot, message } => {
            let resp = client.send_to_ai_bot(&bot, &message).await?;
            println!("{}", resp.reply().unwrap_or("(no reply)"));
        }

        Command::Call {
            method,
            path,
            data,
            no_auth,
            csrf,
        } => {
            let parameters = data
                .map(|raw| serde_json::from_str::<Parameters>(&raw))
                .transpose()
                .context("--data must be a JSON object")?;
            let spec = RequestSpec::new(method, path)
                .parameters(parameters)
                .auth(!no_auth)
                .csrf(csrf);
            let value: JsonValue = client.request_with_cancel(&spec, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Command::Prefs { .. } => anyhow::bail!("preferences are handled without a client"),
    }

    Ok(())
}

/// Fetch a CSRF cookie unless the jar already holds one
async fn ensure_csrf(client: &ApiClient) -> anyhow::Result<()> {
    if client.csrf_cookie().is_none() {
        if let Err(e) = client.fetch_csrf_token().await {
            tracing::warn!(error = %e, "csrf bootstrap failed, continuing without");
        }
    }
    Ok(())
}

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(p) => Ok(p),
        None => {
            eprint!("password: ");
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            Ok(input.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

/// Length and last four characters, enough to tell tokens apart
fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail} ({} chars)", secret.chars().count())
}

fn handle_prefs_command(
    action: &PrefsCommand,
    store: &dyn KeyValueStore,
    credentials: &CredentialStore,
    prefs: Preferences,
) -> anyhow::Result<()> {
    match action {
        PrefsCommand::Show => {
            println!("language: {}", prefs.language()?);

            let secrets = credentials.snapshot();
            for (name, secret) in [
                ("access token", &secrets.access_token),
                ("refresh token", &secrets.refresh_token),
                ("csrf token", &secrets.csrf_token),
            ] {
                println!("{name:<24} {}", mask(secret.expose_secret()));
            }

            for key in store.keys()? {
                if key.to_ascii_lowercase().contains("token") {
                    continue;
                }
                let value = store.get(&key)?.unwrap_or_default();
                println!("{key:<24} {value}");
            }
        }

        PrefsCommand::SetLanguage { language } => {
            prefs.set_language(language)?;
            println!("language set to {language}");
        }
    }

    Ok(())
}
