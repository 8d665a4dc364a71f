use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use argocd_mcp_runtime::{AccessMode, READ_ONLY_ENV};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::BackendConfig;

/// Key of the server entry written into editor configs.
pub const SERVER_ENTRY_NAME: &str = "argocd-mcp";

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("No user configuration directory found on this platform")]
    NoConfigDir,
    #[error("Failed to locate the argocd-mcp executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} must contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// How an editor launches the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ServerEntry {
    pub fn stdio(command: impl Into<String>, backend: &BackendConfig, mode: AccessMode) -> Self {
        let mut env = BTreeMap::new();
        env.insert("ARGOCD_BASE_URL".to_string(), backend.base_url.clone());
        env.insert("ARGOCD_API_TOKEN".to_string(), backend.api_token.clone());
        if mode.is_read_only() {
            env.insert(READ_ONLY_ENV.to_string(), "true".to_string());
        }
        Self {
            command: command.into(),
            args: vec!["stdio".to_string()],
            env,
        }
    }

    /// Entry launching the running binary.
    pub fn for_current_exe(
        backend: &BackendConfig,
        mode: AccessMode,
    ) -> Result<Self, IntegrationError> {
        let exe = std::env::current_exe().map_err(IntegrationError::CurrentExe)?;
        Ok(Self::stdio(exe.to_string_lossy(), backend, mode))
    }
}

/// An editor whose MCP server list we manage.
pub trait IntegrationTarget {
    fn display_name(&self) -> &'static str;

    fn config_path(&self) -> Result<PathBuf, IntegrationError>;

    /// Top-level key holding the server map.
    fn servers_key(&self) -> &'static str;

    fn render_entry(&self, entry: &ServerEntry) -> Value {
        json!({
            "command": entry.command,
            "args": entry.args,
            "env": entry.env,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeDesktop {
    config_dir: Option<PathBuf>,
}

impl ClaudeDesktop {
    pub fn new() -> Self {
        Self {
            config_dir: dirs::config_dir(),
        }
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: Some(config_dir.into()),
        }
    }
}

impl Default for ClaudeDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationTarget for ClaudeDesktop {
    fn display_name(&self) -> &'static str {
        "Claude Desktop"
    }

    fn config_path(&self) -> Result<PathBuf, IntegrationError> {
        let dir = self.config_dir.as_ref().ok_or(IntegrationError::NoConfigDir)?;
        Ok(dir.join("Claude").join("claude_desktop_config.json"))
    }

    fn servers_key(&self) -> &'static str {
        "mcpServers"
    }
}

#[derive(Debug, Clone)]
pub enum VsCode {
    /// `.vscode/mcp.json` under a workspace root.
    Workspace(PathBuf),
    /// `Code/User/mcp.json` under the user config directory.
    User(Option<PathBuf>),
}

impl VsCode {
    pub fn user() -> Self {
        VsCode::User(dirs::config_dir())
    }
}

impl IntegrationTarget for VsCode {
    fn display_name(&self) -> &'static str {
        match self {
            VsCode::Workspace(_) => "VS Code (workspace)",
            VsCode::User(_) => "VS Code (user)",
        }
    }

    fn config_path(&self) -> Result<PathBuf, IntegrationError> {
        match self {
            VsCode::Workspace(root) => Ok(root.join(".vscode").join("mcp.json")),
            VsCode::User(Some(dir)) => Ok(dir.join("Code").join("User").join("mcp.json")),
            VsCode::User(None) => Err(IntegrationError::NoConfigDir),
        }
    }

    fn servers_key(&self) -> &'static str {
        "servers"
    }

    fn render_entry(&self, entry: &ServerEntry) -> Value {
        json!({
            "type": "stdio",
            "command": entry.command,
            "args": entry.args,
            "env": entry.env,
        })
    }
}

/// Adds and removes our server entry while leaving every other property of
/// the editor config untouched.
#[derive(Debug)]
pub struct ConfigManager<T> {
    target: T,
}

impl<T: IntegrationTarget> ConfigManager<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Writes the entry, replacing a previous one. Returns whether an entry
    /// was already present. A servers section that is not an object is
    /// replaced by one holding only this entry.
    pub fn enable(&self, entry: &ServerEntry) -> Result<bool, IntegrationError> {
        let path = self.target.config_path()?;
        let mut config = load_config(&path)?;
        let section = config
            .entry(self.target.servers_key())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            tracing::warn!(
                path = %path.display(),
                key = self.target.servers_key(),
                "replacing malformed servers section"
            );
            *section = Value::Object(Map::new());
        }
        let previous = section.as_object_mut().and_then(|servers| {
            servers.insert(SERVER_ENTRY_NAME.to_string(), self.target.render_entry(entry))
        });
        save_config(&path, &config)?;
        Ok(previous.is_some())
    }

    /// Removes the entry. Returns whether one was removed; the file is left
    /// alone when there was nothing to remove.
    pub fn disable(&self) -> Result<bool, IntegrationError> {
        let path = self.target.config_path()?;
        let mut config = load_config(&path)?;
        let removed = match config.get_mut(self.target.servers_key()) {
            Some(Value::Object(servers)) => servers.remove(SERVER_ENTRY_NAME).is_some(),
            _ => false,
        };
        if removed {
            save_config(&path, &config)?;
        }
        Ok(removed)
    }
}

fn load_config(path: &Path) -> Result<Map<String, Value>, IntegrationError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => {
            return Err(IntegrationError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&raw) {
        Ok(Value::Object(config)) => Ok(config),
        Ok(_) => Err(IntegrationError::NotAnObject {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(IntegrationError::InvalidJson {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn save_config(path: &Path, config: &Map<String, Value>) -> Result<(), IntegrationError> {
    let write_error = |source: std::io::Error| IntegrationError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    let mut data = serde_json::to_string_pretty(config).map_err(|e| IntegrationError::InvalidJson {
        path: path.to_path_buf(),
        source: e,
    })?;
    data.push('\n');
    std::fs::write(path, data).map_err(write_error)
}
