#![deny(warnings)]

// fops-mcp binary: command line and transports

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use fops_mcp::config::{env_keys, Config};
use fops_mcp::error::{FopsError, Result, TransportError};
use fops_mcp::logging::init_tracing;
use fops_mcp::operations::catfile::Encoding;
use fops_mcp::operations::mkfile::parse_mode;
use fops_mcp::server::McpServer;
use fops_mcp::transport::StdioTransport;
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone, Debug, ValueEnum)]
enum TransportMode {
    /// STDIN/STDOUT transport (recommended for editors and local usage)
    Stdio,
    /// WebSocket transport (recommended for hosted MCP services)
    Websocket,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stdio => write!(f, "stdio"),
            TransportMode::Websocket => write!(f, "websocket"),
        }
    }
}

#[derive(Parser)]
#[command(name = "fops-mcp")]
#[command(about = "File operations MCP Server")]
#[command(
    long_about = "fops-mcp exposes sandboxed file creation, recursive reading, deletion, .gitignore merging, script generation and shell execution as MCP tools.\n\nUsage:\n  fops-mcp serve --mode stdio --root ./project\n  fops-mcp serve --mode websocket --host 0.0.0.0 --port 8080"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Transport mode
        #[arg(short, long, default_value_t = TransportMode::Stdio)]
        mode: TransportMode,
        /// Port for WebSocket mode (ignored for stdio)
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Host for WebSocket mode (ignored for stdio)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Sandbox root; every mutation must resolve inside it
        #[arg(long, env = env_keys::ROOT, default_value = ".")]
        root: PathBuf,
        /// Allow mkscript/runscript
        #[arg(long, env = env_keys::ALLOW_SCRIPTS, default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        allow_scripts: bool,
        /// Default catfile encoding
        #[arg(long, env = env_keys::ENCODING, default_value = "base64")]
        encoding: String,
        /// Default mode for mkfile (octal)
        #[arg(long, env = env_keys::FILE_MODE, default_value = "744")]
        file_mode: String,
        /// Log filter, e.g. `info` or `fops_mcp=debug`
        #[arg(long, env = env_keys::LOG, default_value = "info")]
        log_level: String,
        /// Emit logs as JSON lines
        #[arg(long, env = env_keys::LOG_JSON, default_value_t = false)]
        log_json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            mode,
            port,
            host,
            root,
            allow_scripts,
            encoding,
            file_mode,
            log_level,
            log_json,
        } => {
            init_tracing(&log_level, log_json);

            let config = Config {
                root,
                allow_scripts,
                default_encoding: encoding.parse::<Encoding>()?,
                file_mode: parse_mode(&file_mode)?,
            };
            let server = McpServer::new(config)?;

            match mode {
                TransportMode::Stdio => run_stdio_server(server).await?,
                TransportMode::Websocket => run_websocket_server(server, &host, port).await?,
            }
        }
    }

    Ok(())
}

async fn run_stdio_server(server: McpServer) -> Result<()> {
    let mut transport = StdioTransport::stdio();

    loop {
        let frame = match transport.read_message().await {
            Ok(frame) => frame,
            Err(FopsError::Transport(TransportError::ConnectionClosed)) => {
                tracing::info!("stdin closed, shutting down");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(error = %e, "unreadable stdio frame, shutting down");
                return Err(e);
            }
        };
        if frame.trim().is_empty() {
            continue;
        }

        if let Some(reply) = server.handle_text(&frame).await {
            transport.write_message(&reply).await?;
        }
    }
}

async fn run_websocket_server(server: McpServer, host: &str, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(Arc::new(server));

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "WebSocket server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn websocket_handler(ws: WebSocketUpgrade, State(server): State<Arc<McpServer>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, server))
}

async fn serve_socket(socket: WebSocket, server: Arc<McpServer>) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket error");
                break;
            }
        };

        let Some(reply) = server.handle_text(text.as_str()).await else {
            continue;
        };
        if let Err(e) = sender.send(Message::Text(reply.into())).await {
            tracing::warn!(error = %e, "error sending WebSocket reply");
            break;
        }
    }
}
