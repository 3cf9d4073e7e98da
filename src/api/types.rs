//! Serde types matching the performance-management API payloads.
//!
//! The server speaks camelCase JSON; everything here derives both
//! `Serialize` and `Deserialize` so values can round-trip through the cache.

use serde::{Deserialize, Serialize};

/// User roles, ordered by privilege.
///
/// The ordering matters: `Role::Admin >= Role::Staff` is how command and
/// view gating is expressed. This is presentation-only gating; the server
/// enforces the real permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
  Staff,
  Admin,
  SuperAdmin,
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Role::Staff => write!(f, "staff"),
      Role::Admin => write!(f, "admin"),
      Role::SuperAdmin => write!(f, "super-admin"),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: u64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub role: Role,
  #[serde(default)]
  pub department_id: Option<u64>,
  #[serde(default = "default_true")]
  pub active: bool,
}

impl User {
  pub fn display_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

fn default_true() -> bool {
  true
}

/// Summary of an objective for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub owner_id: u64,
  #[serde(default)]
  pub owner_name: Option<String>,
  #[serde(default)]
  pub department_id: Option<u64>,
  /// Completion percentage 0..=100, maintained by the server from task state.
  #[serde(default)]
  pub progress: u8,
  /// None until the assignee accepts or declines.
  #[serde(default)]
  pub accepted: Option<bool>,
  #[serde(default)]
  pub due_date: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: u64,
  pub objective_id: u64,
  pub title: String,
  #[serde(default)]
  pub done: bool,
  #[serde(default)]
  pub assignee_name: Option<String>,
  #[serde(default)]
  pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
  pub id: u64,
  pub task_id: u64,
  pub title: String,
  #[serde(default)]
  pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id: u64,
  pub author_name: String,
  pub body: String,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub member_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id: u64,
  pub message: String,
  #[serde(default)]
  pub read: bool,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// Unread-notification counter, a separate endpoint from the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
  pub count: u64,
}

/// Aggregated rating for a user, department, or the whole organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
  /// Average rating on the server's 1..=5 scale.
  pub average: f64,
  pub count: u64,
}

// ============================================================================
// Auth payloads
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
  pub user: User,
  pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub password: String,
}

// ============================================================================
// Mutation payloads
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObjective {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
  pub objective_id: u64,
  pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
  pub name: String,
}
