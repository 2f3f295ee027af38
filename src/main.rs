use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_tokens::cli::{self, BlobCommands, Commands, TokenCommands};
use edge_tokens::models::token::TokenStatus;
use edge_tokens::store::blob::ListOptions;
use edge_tokens::{api, config, tokens, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    // The one place the shared state (and every client in it) is built.
    let port_override = match &args.command {
        Some(Commands::Serve { port }) => *port,
        _ => None,
    };
    let state = Arc::new(AppState::from_config(cfg)?);

    let result = match args.command {
        Some(Commands::Serve { .. }) | None => run_server(state, port_override).await,
        Some(Commands::Token { command }) => handle_token_command(command, &state).await,
        Some(Commands::Blob { command }) => handle_blob_command(command, &state).await,
        Some(Commands::Sql { statement }) => handle_sql_command(&statement, &state).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "edge_tokens=debug,tower_http=debug".into()),
    );
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(state: Arc<AppState>, port: Option<u16>) -> anyhow::Result<()> {
    if state.config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; every admin call will be rejected");
    }

    let port = port.unwrap_or(state.config.port);
    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("edge-tokens listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}

async fn handle_token_command(cmd: TokenCommands, state: &AppState) -> anyhow::Result<()> {
    let service = state.tokens()?;
    match cmd {
        TokenCommands::Issue { token, ttl_seconds } => {
            let ttl = tokens::parse_ttl(ttl_seconds.map(serde_json::Value::from).as_ref())?;
            let issued = service.issue(token, ttl).await?;
            println!("Token issued (the secret is not shown again):");
            println!("  ID:      {}", issued.id);
            println!("  Token:   {}", issued.token);
            println!("  Status:  {}", issued.status);
            match issued.expires_at {
                Some(exp) => println!("  Expires: {}", exp.to_rfc3339()),
                None => println!("  Expires: never"),
            }
        }
        TokenCommands::Show { id } => match service.get(&id).await? {
            Some(t) => {
                println!("  ID:      {}", t.id);
                println!("  Hash:    {}", t.hash);
                println!("  Status:  {}", t.status);
                println!("  Created: {}", t.created_at.to_rfc3339());
                if let Some(exp) = t.expires_at {
                    println!("  Expires: {}", exp.to_rfc3339());
                }
            }
            None => println!("Token not found."),
        },
        TokenCommands::Disable { id } => {
            service.set_status(&id, TokenStatus::Disabled).await?;
            println!("Token {} disabled.", id);
        }
        TokenCommands::Enable { id } => {
            service.set_status(&id, TokenStatus::Active).await?;
            println!("Token {} enabled.", id);
        }
        TokenCommands::Delete { id } => {
            service.delete(&id).await?;
            println!("Token {} deleted.", id);
        }
    }
    Ok(())
}

async fn handle_blob_command(cmd: BlobCommands, state: &AppState) -> anyhow::Result<()> {
    let blob = state.blob()?;
    match cmd {
        BlobCommands::Upload { pathname, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let res = blob.upload(&pathname, data).await?;
            println!("Uploaded:");
            println!("  Pathname: {}", res.pathname);
            println!("  URL:      {}", res.url);
            println!("  Download: {}", res.download_url);
        }
        BlobCommands::Delete { target } => {
            blob.delete(&target).await?;
            println!("Blob {} deleted.", target);
        }
        BlobCommands::List {
            prefix,
            cursor,
            limit,
        } => {
            let res = blob
                .list(&ListOptions {
                    prefix,
                    cursor,
                    limit,
                })
                .await?;
            if res.blobs.is_empty() {
                println!("No blobs found.");
            } else {
                println!("{:<50} {:>10} UPLOADED", "PATHNAME", "SIZE");
                for b in res.blobs {
                    println!(
                        "{:<50} {:>10} {}",
                        b.pathname,
                        b.size,
                        b.uploaded_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            if let (true, Some(cursor)) = (res.has_more, res.cursor) {
                println!("More results: --cursor {}", cursor);
            }
        }
    }
    Ok(())
}

async fn handle_sql_command(statement: &str, state: &AppState) -> anyhow::Result<()> {
    let rs = state.sql()?.execute(statement, &[]).await?;
    if !rs.columns.is_empty() {
        println!("{}", rs.columns.join("\t"));
        for row in &rs.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            println!("{}", cells.join("\t"));
        }
    }
    println!("({} rows, {} affected)", rs.rows.len(), rs.rows_affected);
    Ok(())
}
