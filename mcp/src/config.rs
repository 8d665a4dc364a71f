use argocd_mcp_runtime::{AccessMode, BackendArgs, McpRuntimeConfig};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Argo CD base URL is required (--url or ARGOCD_BASE_URL)")]
    MissingBaseUrl,
    #[error("Argo CD API token is required (--token or ARGOCD_API_TOKEN)")]
    MissingToken,
    #[error("Invalid Argo CD base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Backend URL and token after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: String,
}

impl BackendConfig {
    pub fn from_args(args: &BackendArgs) -> Result<Self, ConfigError> {
        let base_url = non_empty(args.url.as_deref()).ok_or(ConfigError::MissingBaseUrl)?;
        let api_token = non_empty(args.token.as_deref()).ok_or(ConfigError::MissingToken)?;
        validate_base_url(base_url)?;
        Ok(Self {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn into_runtime(self, mode: AccessMode) -> McpRuntimeConfig {
        McpRuntimeConfig {
            base_url: self.base_url,
            api_token: self.api_token,
            mode,
        }
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

pub fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
