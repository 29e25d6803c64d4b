//! Daemon configuration from the environment
//!
//! Recognized variables (an empty value counts as unset):
//! - IRC_DIR (base directory, default ".")
//! - IRC_HOST (remote host, default "irc.freenode.org")
//! - IRC_PORT (remote port, default "6667")
//! - IRC_CLIENT (worker command, default "jjc")
//! - IRC_NICK (default: login name of the effective user)
//! - IRC_USER, IRC_REALNAME (default: the nick)
//! - IRC_UCSPI (use descriptors 6/7 from a superserver instead of dialing)
//!
//! The configuration is read once at startup. Nothing else in the crate
//! looks at the process environment; the worker receives these values
//! through `Config::worker_env`.

use std::io;
use std::path::PathBuf;

use crate::error::{RelayError, Result};

pub const DEFAULT_DIR: &str = ".";
pub const DEFAULT_HOST: &str = "irc.freenode.org";
pub const DEFAULT_PORT: &str = "6667";
pub const DEFAULT_CLIENT: &str = "jjc";

/// Name of the FIFO inside the per-host directory
pub const FIFO_NAME: &str = "in";

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dir: PathBuf,
    pub host: String,
    pub port: String,
    pub client: String,
    pub nick: String,
    pub user: String,
    pub realname: String,
    /// Adopt superserver descriptors instead of dialing `host:port`
    pub ucspi: bool,
}

impl Config {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), login_name)
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// `username` is only called when IRC_NICK is unset.
    pub fn from_lookup<F, U>(lookup: F, username: U) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
        U: FnOnce() -> Result<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let nick = match get("IRC_NICK") {
            Some(nick) => nick,
            None => username()?,
        };
        let user = get("IRC_USER").unwrap_or_else(|| nick.clone());
        let realname = get("IRC_REALNAME").unwrap_or_else(|| nick.clone());

        Ok(Self {
            dir: PathBuf::from(get("IRC_DIR").unwrap_or_else(|| DEFAULT_DIR.to_string())),
            host: get("IRC_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: get("IRC_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string()),
            client: get("IRC_CLIENT").unwrap_or_else(|| DEFAULT_CLIENT.to_string()),
            nick,
            user,
            realname,
            ucspi: get("IRC_UCSPI").map(|v| v != "0").unwrap_or(false),
        })
    }

    /// Directory holding this session's FIFO
    pub fn session_dir(&self) -> PathBuf {
        self.dir.join(&self.host)
    }

    /// Full path of the command FIFO
    pub fn fifo_path(&self) -> PathBuf {
        self.session_dir().join(FIFO_NAME)
    }

    /// Keepalive probe sent to the remote peer on idle
    pub fn keepalive_line(&self) -> String {
        format!("PING {}\r\n", self.host)
    }

    /// Environment handed to the worker process
    pub fn worker_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("IRC_DIR", self.dir.display().to_string()),
            ("IRC_HOST", self.host.clone()),
            ("IRC_PORT", self.port.clone()),
            ("IRC_CLIENT", self.client.clone()),
            ("IRC_NICK", self.nick.clone()),
            ("IRC_USER", self.user.clone()),
            ("IRC_REALNAME", self.realname.clone()),
        ]
    }
}

/// Login name of the effective user
fn login_name() -> Result<String> {
    whoami::fallible::username()
        .map_err(|e| RelayError::Username(io::Error::new(io::ErrorKind::NotFound, e)))
}
