use std::sync::Arc;

use argocd_mcp_runtime::{AccessMode, BackendArgs, McpServer};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod http;
mod integration;

use config::BackendConfig;
use integration::{
    ClaudeDesktop, ConfigManager, IntegrationTarget, SERVER_ENTRY_NAME, ServerEntry, VsCode,
};

#[derive(Parser)]
#[command(
    name = "argocd-mcp",
    version,
    about = "Argo CD MCP server: inspect and manage applications from an AI agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout
    Stdio {
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Serve MCP over the legacy SSE transport (GET /sse, POST /messages)
    Sse {
        #[command(flatten)]
        backend: BackendArgs,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Serve MCP over HTTP (POST /mcp)
    Http {
        #[command(flatten)]
        backend: BackendArgs,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Manage the Claude Desktop integration
    Claude {
        #[command(subcommand)]
        command: ClaudeCommands,
    },
    /// Manage the VS Code integration
    Vscode {
        #[command(subcommand)]
        command: VsCodeCommands,
    },
}

#[derive(Subcommand)]
enum ClaudeCommands {
    /// Add argocd-mcp to the Claude Desktop config
    Enable {
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Remove argocd-mcp from the Claude Desktop config
    Disable,
}

#[derive(Subcommand)]
enum VsCodeCommands {
    /// Add argocd-mcp to the VS Code MCP config
    Enable {
        #[command(flatten)]
        backend: BackendArgs,
        /// Write .vscode/mcp.json in the current directory instead of the user config
        #[arg(long)]
        workspace: bool,
    },
    /// Remove argocd-mcp from the VS Code MCP config
    Disable {
        /// Edit .vscode/mcp.json in the current directory instead of the user config
        #[arg(long)]
        workspace: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argocd_mcp=info,argocd_mcp_runtime=info".into()),
        )
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let code = run(cli.command).await;
    std::process::exit(code);
}

async fn run(command: Commands) -> i32 {
    match command {
        Commands::Stdio { backend } => {
            let Some(server) = build_server(&backend) else {
                return 1;
            };
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => fail("mcp_server_error", &err.to_string()),
            }
        }
        Commands::Sse { backend, port } => {
            let Some(server) = build_server(&backend) else {
                return 1;
            };
            match http::serve_sse(Arc::new(server), port).await {
                Ok(()) => 0,
                Err(err) => fail("mcp_server_error", &err.to_string()),
            }
        }
        Commands::Http { backend, port } => {
            let Some(server) = build_server(&backend) else {
                return 1;
            };
            match http::serve(Arc::new(server), port).await {
                Ok(()) => 0,
                Err(err) => fail("mcp_server_error", &err.to_string()),
            }
        }
        Commands::Claude { command } => match command {
            ClaudeCommands::Enable { backend } => enable(ClaudeDesktop::new(), &backend),
            ClaudeCommands::Disable => disable(ClaudeDesktop::new()),
        },
        Commands::Vscode { command } => match command {
            VsCodeCommands::Enable { backend, workspace } => match vscode_target(workspace) {
                Ok(target) => enable(target, &backend),
                Err(err) => fail("integration_error", &err.to_string()),
            },
            VsCodeCommands::Disable { workspace } => match vscode_target(workspace) {
                Ok(target) => disable(target),
                Err(err) => fail("integration_error", &err.to_string()),
            },
        },
    }
}

fn build_server(backend: &BackendArgs) -> Option<McpServer> {
    let config = match BackendConfig::from_args(backend) {
        Ok(config) => config,
        Err(err) => {
            fail("config_error", &err.to_string());
            return None;
        }
    };
    match McpServer::new(config.into_runtime(AccessMode::from_env())) {
        Ok(server) => Some(server),
        Err(err) => {
            fail("config_error", &err.to_string());
            None
        }
    }
}

fn vscode_target(workspace: bool) -> std::io::Result<VsCode> {
    if workspace {
        Ok(VsCode::Workspace(std::env::current_dir()?))
    } else {
        Ok(VsCode::user())
    }
}

fn enable<T: IntegrationTarget>(target: T, backend: &BackendArgs) -> i32 {
    let config = match BackendConfig::from_args(backend) {
        Ok(config) => config,
        Err(err) => return fail("config_error", &err.to_string()),
    };
    let manager = ConfigManager::new(target);
    let outcome = ServerEntry::for_current_exe(&config, AccessMode::from_env())
        .and_then(|entry| manager.enable(&entry));
    match outcome {
        Ok(already_present) => report(
            manager.target(),
            json!({
                "status": "enabled",
                "replaced_existing": already_present,
            }),
        ),
        Err(err) => fail("integration_error", &err.to_string()),
    }
}

fn disable<T: IntegrationTarget>(target: T) -> i32 {
    let manager = ConfigManager::new(target);
    match manager.disable() {
        Ok(removed) => report(
            manager.target(),
            json!({
                "status": if removed { "disabled" } else { "not_present" },
                "removed": removed,
            }),
        ),
        Err(err) => fail("integration_error", &err.to_string()),
    }
}

fn report<T: IntegrationTarget>(target: &T, mut payload: Value) -> i32 {
    payload["target"] = json!(target.display_name());
    payload["server"] = json!(SERVER_ENTRY_NAME);
    if let Ok(path) = target.config_path() {
        payload["config_path"] = json!(path.display().to_string());
    }
    println!("{}", to_pretty_json(&payload));
    0
}

fn fail(code: &str, message: &str) -> i32 {
    let payload = json!({
        "error": code,
        "message": message,
    });
    eprintln!("{}", to_pretty_json(&payload));
    1
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
