use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PersistenceError};

/// Authenticated cookie state obtained by an operator outside of automation.
///
/// A token is built once (see [`SessionToken::from_cookie_header`]), saved,
/// and then only ever read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    cookies: BTreeMap<String, String>,
    saved_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn new(cookies: BTreeMap<String, String>) -> Self {
        Self {
            cookies,
            saved_at: None,
        }
    }

    /// Parses a browser `Cookie:` header value (`a=1; b=2`), as copied by the
    /// operator after logging in by hand.
    pub fn from_cookie_header(header: &str) -> Result<Self, ConfigError> {
        let header = header.trim();
        let header = header
            .strip_prefix("Cookie:")
            .or_else(|| header.strip_prefix("cookie:"))
            .unwrap_or(header);

        let cookies: BTreeMap<String, String> = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect();

        if cookies.is_empty() {
            return Err(ConfigError::EmptyCookieHeader);
        }
        Ok(Self::new(cookies))
    }

    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }
}

/// File-backed persistence for the [`SessionToken`].
///
/// `save` expects an already authenticated session; logging in (including the
/// CAPTCHA) is the operator's job and never happens here.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the token, replacing whatever was stored before.
    pub fn save(&self, token: &SessionToken) -> Result<(), PersistenceError> {
        if token.is_empty() {
            return Err(PersistenceError::Empty {
                path: self.path.clone(),
            });
        }
        let io_err = |source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };

        let mut stamped = token.clone();
        stamped.saved_at = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(&stamped).map_err(|source| {
            PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, bytes).map_err(io_err)?;

        info!(
            "Saved session with {} cookie(s) to {}",
            token.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads the stored token. A missing, unreadable, corrupt or empty store
    /// is an error; there is no anonymous fallback.
    pub fn load(&self) -> Result<SessionToken, PersistenceError> {
        let bytes = fs::read(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PersistenceError::Missing {
                path: self.path.clone(),
            },
            _ => PersistenceError::Io {
                path: self.path.clone(),
                source,
            },
        })?;

        let token: SessionToken =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if token.is_empty() {
            return Err(PersistenceError::Empty {
                path: self.path.clone(),
            });
        }
        Ok(token)
    }
}
