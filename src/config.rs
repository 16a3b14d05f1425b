use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::backend::OAuthProvider;

const DEFAULT_DATABASE: &str = "todos.db";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: PathBuf,
    pub base_path: String,
    pub public_url: String,
    pub api_key: Option<String>,
    pub oauth_providers: Vec<OAuthProvider>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = lookup("TASKLANE_PORT")
            .ok_or(ConfigError::Missing("TASKLANE_PORT"))?
            .parse()
            .map_err(|err: std::num::ParseIntError| ConfigError::Invalid {
                name: "TASKLANE_PORT",
                reason: err.to_string(),
            })?;

        let database = lookup("TASKLANE_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));

        let base_path = lookup("TASKLANE_BASE_PATH")
            .map(|path| normalize_base_path(&path))
            .unwrap_or_default();

        let public_url = lookup("TASKLANE_PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}{base_path}"));

        let api_key = lookup("TASKLANE_API_KEY").filter(|key| !key.is_empty());

        let mut oauth_providers = Vec::new();
        if let Some(client_id) = lookup("TASKLANE_GITHUB_CLIENT_ID") {
            let raw = lookup("TASKLANE_GITHUB_AUTHORIZE_URL")
                .unwrap_or_else(|| GITHUB_AUTHORIZE_URL.to_string());
            let authorize_url = Url::parse(&raw).map_err(|err| ConfigError::Invalid {
                name: "TASKLANE_GITHUB_AUTHORIZE_URL",
                reason: err.to_string(),
            })?;
            oauth_providers.push(OAuthProvider {
                name: "github".to_string(),
                client_id,
                authorize_url,
            });
        }

        Ok(Config {
            port,
            database,
            base_path,
            public_url,
            api_key,
            oauth_providers,
        })
    }
}

fn normalize_base_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
