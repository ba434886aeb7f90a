use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SERVER: &str = "http://localhost:3000";

/// Login state kept between CLI invocations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub server: Option<String>,
    pub token: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Token, unless it is known to be expired
    pub fn active_token(&self) -> Option<&str> {
        match self.expires_at {
            Some(expires_at) if expires_at <= Utc::now() => None,
            _ => self.token.as_deref(),
        }
    }

    pub fn clear_login(&mut self) {
        self.token = None;
        self.email = None;
        self.expires_at = None;
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("PIXXOR_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("pixxor").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<Session> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(Session::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: Session = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session(session: &Session) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(session)?;
    fs::write(session_file, content)?;
    Ok(())
}

/// `--server`, then `PIXXOR_SERVER`, then the saved session, then localhost
pub fn resolve_server(flag: Option<&str>, session: &Session) -> String {
    flag.map(str::to_string)
        .or_else(|| std::env::var("PIXXOR_SERVER").ok().filter(|s| !s.trim().is_empty()))
        .or_else(|| session.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string())
}
