mod commands;
mod config;
mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{AccountClient, ClientError, ClientEvent, FeedClient, Session, TickOutcome};
use commands::{FeedCommand, HELP};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::oneshot,
};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "feed", about = "Terminal client for the message feed")]
struct Args {
    /// Overrides `server_url` from client.toml and the environment.
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and print the issued token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Follow the feed interactively.
    Watch {
        #[arg(long)]
        username: String,
        /// Falls back to FEED_TOKEN; with neither, logs in with --password.
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    let client_config = settings.client_config()?;

    match args.command {
        Command::Signup { username, password } => {
            let accounts = AccountClient::new(&client_config)?;
            accounts
                .sign_up(&username, &password)
                .await
                .context("sign up failed")?;
            println!("Account '{username}' created.");
        }
        Command::Login { username, password } => {
            let accounts = AccountClient::new(&client_config)?;
            let session = accounts
                .login(&username, &password)
                .await
                .context("login failed")?;
            println!("{}", session.token());
        }
        Command::Watch {
            username,
            token,
            password,
        } => {
            let session = match (token.or(settings.token), password) {
                (Some(token), _) => Session::new(token, username.as_str())?,
                (None, Some(password)) => AccountClient::new(&client_config)?
                    .login(&username, &password)
                    .await
                    .context("login failed")?,
                (None, None) => bail!("watch needs --token, FEED_TOKEN or --password"),
            };
            let client = FeedClient::new(client_config)?;
            watch(client, session).await?;
        }
    }

    Ok(())
}

async fn watch(client: FeedClient, session: Session) -> Result<()> {
    let (expired_tx, mut expired_rx) = oneshot::channel();
    let printer = tokio::spawn(print_events(
        BroadcastStream::new(client.subscribe_events()),
        expired_tx,
    ));

    client.start_session(session).await?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = &mut expired_rx => {
                println!("Session expired, log in again.");
                break;
            }
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else { break };

        let command = match FeedCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}. {HELP}");
                continue;
            }
        };
        match command {
            FeedCommand::Quit => break,
            FeedCommand::Help => println!("{HELP}"),
            FeedCommand::Refresh => match client.refresh().await? {
                TickOutcome::Skipped => println!("A refresh is already running."),
                TickOutcome::Failed(err) => println!("Refresh failed: {err}"),
                TickOutcome::Applied(_) | TickOutcome::Discarded => {}
            },
            FeedCommand::Post(content) => {
                if let Err(err) = client.post_message(&content).await {
                    report(&err, "post");
                }
            }
            FeedCommand::Vote(position, direction) => {
                let view = client.view().await;
                let Some(entry) = view.get(position - 1) else {
                    println!("No message #{position}.");
                    continue;
                };
                if let Err(err) = client.cast_vote(&entry.message.id, direction).await {
                    report(&err, "vote");
                }
            }
        }
    }

    client.end_session().await;
    printer.abort();
    info!("watch: finished");
    Ok(())
}

async fn print_events(
    mut events: BroadcastStream<ClientEvent>,
    expired: oneshot::Sender<()>,
) {
    while let Some(event) = events.next().await {
        match event {
            Ok(ClientEvent::FeedUpdated(view)) => print!("{}", render::render_feed(&view)),
            Ok(ClientEvent::PollFailed(err)) => println!("(feed not updated: {err})"),
            Ok(ClientEvent::SessionInvalidated) => {
                let _ = expired.send(());
                return;
            }
            Ok(ClientEvent::VoteResolved { .. } | ClientEvent::PostResolved { .. }) => {}
            Err(err) => warn!(error = %err, "watch: dropped events"),
        }
    }
}

fn report(err: &ClientError, action: &str) {
    match err {
        ClientError::Superseded(_) => {}
        ClientError::EmptyInput => println!("Message can't be empty."),
        err if err.requires_reauth() => println!("Not logged in: {err}"),
        err if err.is_retryable() => println!("Could not {action}, try again: {err}"),
        err => println!("Could not {action}: {err}"),
    }
}
