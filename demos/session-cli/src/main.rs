//! local-auth session demo
//!
//! Signs in against a JSON API, keeps the session in the platform config
//! directory between runs, and shows how the route guard sees it.
//!
//! Run with:
//!   cargo run -p local-auth-session-cli -- --origin http://localhost:3000 \
//!     login --field email=me@example.com --field password=secret
//!   cargo run -p local-auth-session-cli -- --origin http://localhost:3000 me
//!   cargo run -p local-auth-session-cli -- --config auth.json status --route /settings

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use local_auth::{LocalAuthClient, LocalAuthOptions, RoutePolicy, SessionStatus};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Bearer-token session demo
#[derive(Parser, Debug)]
#[command(name = "session-cli")]
#[command(about = "Sign in, inspect and sign out of a token-based API session")]
struct Args {
    /// JSON options file (camelCase keys, unspecified options use defaults)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// API base URL; overrides the options file
    #[arg(long, short = 'o')]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with credential fields (`--field key=value`, repeatable)
    Login {
        #[arg(long = "field", short = 'f', value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Load the current user's profile
    Me,
    /// Show the stored session and the guard decision for a route
    Status {
        #[arg(long, default_value = "/")]
        route: String,
    },
    /// Sign out and forget the stored session
    Logout,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn load_options(args: &Args) -> anyhow::Result<LocalAuthOptions> {
    let mut options = match &args.config {
        Some(path) => LocalAuthOptions::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LocalAuthOptions::default(),
    };
    if let Some(origin) = &args.origin {
        options.origin.clone_from(origin);
    }
    if options.origin.is_empty() {
        bail!("no API origin: pass --origin or set `origin` in the options file");
    }
    Ok(options)
}

fn print_session(client: &LocalAuthClient) {
    let metadata = client.store().metadata();
    println!("status:        {}", metadata.status);
    println!(
        "token:         {}",
        if metadata.has_token() { "present" } else { "none" }
    );
    println!(
        "refresh token: {}",
        if metadata.refresh_token.is_some() { "present" } else { "none" }
    );
    match metadata.expires_at {
        Some(expires_at) => println!("expires at:    {expires_at} (epoch seconds)"),
        None => println!("expires at:    unknown"),
    }

    let data = client.store().data();
    if !data.is_empty() {
        match serde_json::to_string_pretty(&Value::Object(data)) {
            Ok(profile) => println!("profile:\n{profile}"),
            Err(e) => tracing::warn!(error = %e, "Could not render profile"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Quiet by default, use RUST_LOG=debug to follow the session engine
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = load_options(&args)?;
    let client = LocalAuthClient::builder(options)
        .file_persistence()
        .build()
        .context("invalid options")?;

    match args.command {
        Command::Login { fields } => {
            let credentials: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            client.sign_in(&credentials, None).await?;
            println!("Signed in.");
            print_session(&client);
        }
        Command::Me => {
            client.get_me().await?;
            print_session(&client);
        }
        Command::Status { route } => {
            print_session(&client);
            let decision = client.guard().check(&route, &RoutePolicy::Enabled(true));
            println!("guard {route}: {decision:?}");
            if client.store().status() == SessionStatus::Timeout {
                println!("The API was unreachable on the last attempt.");
            }
        }
        Command::Logout => {
            if let Err(e) = client.sign_out(None).await {
                eprintln!("Server sign-out failed ({e}); local session cleared anyway.");
            }
            println!("Signed out.");
        }
    }

    Ok(())
}
