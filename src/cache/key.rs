//! Cache keys: (endpoint name, serialized argument).

use serde::Serialize;

/// Identifies one query result in the cache.
///
/// Two views asking for the same endpoint with the same argument share one
/// entry, one in-flight request, and one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  endpoint: &'static str,
  arg: String,
}

impl QueryKey {
  /// Key for an endpoint taking an argument. The argument is serialized to
  /// JSON so structurally equal arguments map to the same key.
  pub fn new(endpoint: &'static str, arg: &impl Serialize) -> Self {
    let arg = serde_json::to_string(arg).unwrap_or_else(|_| String::from("<unserializable>"));
    Self { endpoint, arg }
  }

  /// Key for an argument-less endpoint.
  pub fn bare(endpoint: &'static str) -> Self {
    Self {
      endpoint,
      arg: String::new(),
    }
  }
}

impl std::fmt::Display for QueryKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.arg.is_empty() {
      write!(f, "{}", self.endpoint)
    } else {
      write!(f, "{}({})", self.endpoint, self.arg)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_equal_args_share_a_key() {
    assert_eq!(QueryKey::new("objectives", &42u64), QueryKey::new("objectives", &42u64));
    assert_ne!(QueryKey::new("objectives", &42u64), QueryKey::new("objectives", &43u64));
    assert_ne!(QueryKey::new("objectives", &42u64), QueryKey::new("tasks", &42u64));
  }

  #[test]
  fn test_display() {
    assert_eq!(QueryKey::bare("notifications").to_string(), "notifications");
    assert_eq!(QueryKey::new("tasks", &7u64).to_string(), "tasks(7)");
  }
}
