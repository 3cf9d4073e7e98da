//! Session store: the single source of truth for "who is logged in".
//!
//! The current user and bearer token live in memory and are mirrored to a
//! JSON file under the data dir, so a returning user is not bounced back to
//! the login view. Rehydration happens synchronously at startup, before the
//! first render.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::api::types::{Role, User};

/// The persisted session record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
  pub user: Option<User>,
  pub token: Option<String>,
}

/// Shared handle to the session. Cheap to clone; the transport reads the
/// token from it on every request, views read the user for role gating.
#[derive(Clone)]
pub struct SessionStore {
  inner: Arc<RwLock<Session>>,
  path: PathBuf,
}

impl SessionStore {
  /// Open the store at the default location and rehydrate from disk.
  pub fn open() -> Result<Self> {
    Self::open_at(Self::default_path()?)
  }

  /// Open the store at an explicit path (used by tests).
  pub fn open_at(path: PathBuf) -> Result<Self> {
    let session = match std::fs::read_to_string(&path) {
      Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
        // A corrupt session file means logging in again, not a crash.
        warn!("discarding unreadable session file: {}", e);
        Session::default()
      }),
      Err(_) => Session::default(),
    };

    Ok(Self {
      inner: Arc::new(RwLock::new(session)),
      path,
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pmdash").join("session.json"))
  }

  /// Store user and token, in memory and on disk. Requests issued after this
  /// call carry the new token.
  pub fn set_credentials(&self, user: User, token: String) -> Result<()> {
    let session = Session {
      user: Some(user),
      token: Some(token),
    };
    self.persist(&session)?;
    *self.write()? = session;
    Ok(())
  }

  /// Clear memory and disk. In-flight requests already holding the old token
  /// are not cancelled; this is best-effort only.
  pub fn logout(&self) -> Result<()> {
    *self.write()? = Session::default();
    if self.path.exists() {
      std::fs::remove_file(&self.path)
        .map_err(|e| eyre!("Failed to remove session file {}: {}", self.path.display(), e))?;
    }
    Ok(())
  }

  /// Current bearer token, if logged in.
  pub fn token(&self) -> Option<String> {
    self.read().token.clone()
  }

  /// Current user, if logged in.
  pub fn user(&self) -> Option<User> {
    self.read().user.clone()
  }

  /// Current role, if logged in.
  pub fn role(&self) -> Option<Role> {
    self.read().user.as_ref().map(|u| u.role)
  }

  pub fn is_logged_in(&self) -> bool {
    self.read().token.is_some()
  }

  fn persist(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }
    let contents = serde_json::to_string_pretty(session)
      .map_err(|e| eyre!("Failed to serialize session: {}", e))?;
    std::fs::write(&self.path, contents)
      .map_err(|e| eyre!("Failed to write session file {}: {}", self.path.display(), e))?;
    Ok(())
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
    // Lock poisoning would mean a panic mid-write on the UI task; unrecoverable.
    self.inner.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Session>> {
    Ok(self.inner.write().unwrap_or_else(|e| e.into_inner()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_user() -> User {
    User {
      id: 7,
      first_name: "Ada".into(),
      last_name: "Mensah".into(),
      email: "ada@example.com".into(),
      role: Role::Staff,
      department_id: Some(2),
      active: true,
    }
  }

  #[test]
  fn test_set_credentials_then_read_then_logout() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open_at(dir.path().join("session.json")).unwrap();

    assert!(!store.is_logged_in());

    store
      .set_credentials(test_user(), "tok-123".into())
      .unwrap();
    assert_eq!(store.token().as_deref(), Some("tok-123"));
    assert_eq!(store.user().unwrap().email, "ada@example.com");
    assert_eq!(store.role(), Some(Role::Staff));

    store.logout().unwrap();
    assert!(store.token().is_none());
    assert!(store.user().is_none());
  }

  #[test]
  fn test_rehydrates_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    {
      let store = SessionStore::open_at(path.clone()).unwrap();
      store
        .set_credentials(test_user(), "persisted".into())
        .unwrap();
    }

    // A fresh store at the same path sees the previous login.
    let store = SessionStore::open_at(path).unwrap();
    assert_eq!(store.token().as_deref(), Some("persisted"));
    assert_eq!(store.user().unwrap().id, 7);
  }

  #[test]
  fn test_corrupt_session_file_starts_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").unwrap();

    let store = SessionStore::open_at(path).unwrap();
    assert!(!store.is_logged_in());
  }
}
