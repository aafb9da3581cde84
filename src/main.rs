//! CLI entry point for the OpenRosa client.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use openrosa_core::transport::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use openrosa_core::{ClientSession, CredentialStore, ReqwestTransport, ServerSettings};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod prompt;

use app_config::{FileConfig, load_config};
use cli::{Args, Command, CredentialsCommand};
use prompt::TerminalPrompt;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = load_config(args.config.as_deref())?.unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .verbosity
                .map_or("info", |verbosity| verbosity.default_level()),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let store = Arc::new(
        CredentialStore::load_persisted().context("Failed to load stored credentials")?,
    );
    let revision = store.revision();

    match &args.command {
        Command::Fetch { url } => {
            let session = build_session(&args, &file_config, Arc::clone(&store))?;
            fetch(&session, url).await?;
        }
        Command::Probe { url } => {
            let session = build_session(&args, &file_config, Arc::clone(&store))?;
            probe(&session, url).await?;
        }
        Command::Credentials(command) => credentials(&store, command)?,
    }

    if store.revision() != revision {
        let path = store
            .save_persisted()
            .context("Failed to save stored credentials")?;
        info!(path = %path.display(), "credentials saved");
    }

    Ok(())
}

fn build_session(
    args: &Args,
    file_config: &FileConfig,
    store: Arc<CredentialStore>,
) -> Result<ClientSession> {
    let server_url = args
        .server
        .clone()
        .or_else(|| file_config.server_url.clone())
        .unwrap_or_default();
    if server_url.is_empty() {
        debug!("no server URL configured; credentials are stored per request URL");
    }

    let connect_timeout = file_config
        .connect_timeout_secs
        .unwrap_or(CONNECT_TIMEOUT_SECS);
    let request_timeout = file_config
        .request_timeout_secs
        .unwrap_or(REQUEST_TIMEOUT_SECS);

    let transport = ReqwestTransport::with_connect_timeout(Duration::from_secs(connect_timeout))
        .context("Failed to build HTTP client")?;
    let settings =
        ServerSettings::new(server_url).with_request_timeout(Duration::from_secs(request_timeout));

    Ok(ClientSession::new(settings, Arc::new(transport))
        .with_credential_store(store)
        .with_prompt(Arc::new(TerminalPrompt {
            default_username: file_config.username.clone(),
        })))
}

async fn fetch(session: &ClientSession, url: &str) -> Result<()> {
    let result = session.server_client().get_xml_document(url).await;
    if let Some(message) = result.error_message() {
        bail!("{message}");
    }

    let open_rosa = if result.is_open_rosa_response() { "yes" } else { "no" };
    if let Some(document) = result.document() {
        let root = document.root();
        println!(
            "{} ({} child elements) status={} openrosa={open_rosa}",
            root.name(),
            root.children().count(),
            result.response_code(),
        );
        for child in root.children() {
            let label = child
                .child("name")
                .or_else(|| child.child("formID"))
                .map(openrosa_core::XmlElement::text)
                .unwrap_or_default();
            println!("  {} {label}", child.local_name());
        }
    }
    Ok(())
}

async fn probe(session: &ClientSession, url: &str) -> Result<()> {
    let head = session
        .server_client()
        .head(url)
        .await
        .with_context(|| format!("HEAD probe failed for {url}"))?;

    println!("status={}", head.status);
    println!("openrosa={}", head.is_open_rosa_response);
    if let Some(limit) = head.accept_content_length {
        println!("accept-content-length={limit}");
    }
    if let Some(location) = &head.location {
        println!("location={location}");
    }
    if !head.is_open_rosa_response {
        warn!(url, "endpoint did not identify as an OpenRosa server");
    }
    Ok(())
}

fn credentials(store: &CredentialStore, command: &CredentialsCommand) -> Result<()> {
    match command {
        CredentialsCommand::Set { url, username } => {
            openrosa_core::transport::validate_url(url)
                .with_context(|| format!("Cannot store credentials for '{url}'"))?;
            let password = read_password()?;
            store.set(url, username, &password);
            println!("Stored credentials for {url}");
        }
        CredentialsCommand::Clear { url } => {
            if store.clear(url) {
                println!("Cleared credentials for {url}");
            } else {
                println!("No credentials stored for {url}");
            }
        }
        CredentialsCommand::Show { url } => {
            let found = store.get(url);
            if found.has_credentials() {
                println!("{} (stored under {})", found.username, found.server_url);
            } else {
                println!("No credentials for {url}");
            }
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    if io::stdin().is_terminal() {
        info!("Enter password, then press Enter:");
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let password = buffer.lines().next().unwrap_or_default().to_string();
    if password.is_empty() {
        bail!("No password provided on stdin");
    }
    Ok(password)
}
