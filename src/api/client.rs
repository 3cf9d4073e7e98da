//! HTTP transport for the performance-management API.
//!
//! One method per endpoint. Every call attaches the bearer token currently
//! held by the session store, serializes bodies as JSON, and maps non-2xx
//! responses to [`ApiError::Server`] carrying the server's message body.
//! No retries happen here, with one exception: the objective accept/decline
//! token flows fall back to the mutation endpoint when the token call fails.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{
  Comment, Department, LoginRequest, LoginResponse, NewDepartment, NewObjective, NewTask,
  Notification, Objective, RatingSummary, RegisterRequest, Role, SubTask, Task, UnreadCount, User,
};
use crate::config::Config;
use crate::session::SessionStore;

/// Shape of the server's error body.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
  message: String,
}

/// API client. Cheap to clone; all clones share the reqwest pool and the
/// session store.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  session: SessionStore,
}

impl ApiClient {
  pub fn new(config: &Config, session: SessionStore) -> color_eyre::Result<Self> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid api.base_url: {}", e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base_url,
      session,
    })
  }

  fn url(&self, path: &str) -> ApiResult<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::Network(format!("invalid url {}: {}", path, e)))
  }

  /// Issue one request and parse the JSON body. The single funnel every
  /// resource method goes through.
  async fn request(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<Value>,
  ) -> ApiResult<Value> {
    let url = self.url(path)?;
    let mut req = self.http.request(method, url).query(query);

    if let Some(token) = self.session.token() {
      req = req.bearer_auth(token);
    }
    if let Some(body) = body {
      req = req.json(&body);
    }

    let response = req
      .send()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;

    if !status.is_success() {
      // Prefer the server's structured message; fall back to the status line.
      let message = serde_json::from_slice::<ErrorBody>(&bytes)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
          status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
        });
      return Err(ApiError::Server {
        status: status.as_u16(),
        message,
      });
    }

    if bytes.is_empty() || status == StatusCode::NO_CONTENT {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes)
      .map_err(|e| ApiError::Network(format!("invalid response body: {}", e)))
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
    let value = self.request(Method::GET, path, query, None).await?;
    from_value(value)
  }

  async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> ApiResult<T> {
    let body = to_value(body)?;
    let value = self.request(Method::POST, path, &[], Some(body)).await?;
    from_value(value)
  }

  async fn put<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> ApiResult<T> {
    let body = to_value(body)?;
    let value = self.request(Method::PUT, path, &[], Some(body)).await?;
    from_value(value)
  }

  async fn delete(&self, path: &str) -> ApiResult<()> {
    self.request(Method::DELETE, path, &[], None).await?;
    Ok(())
  }

  // ==========================================================================
  // Auth
  // ==========================================================================

  pub async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
    self.post("auth/login", request).await
  }

  pub async fn register(&self, request: &RegisterRequest) -> ApiResult<LoginResponse> {
    self.post("auth/register", request).await
  }

  /// Best-effort server-side logout; the local session is cleared regardless.
  pub async fn logout(&self) -> ApiResult<()> {
    self
      .request(Method::POST, "auth/logout", &[], None)
      .await?;
    Ok(())
  }

  /// The server acknowledges with a free-form message body; only the status
  /// matters here.
  pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
    self
      .request(
        Method::POST,
        "auth/forgot-password",
        &[],
        Some(serde_json::json!({ "email": email })),
      )
      .await?;
    Ok(())
  }

  // ==========================================================================
  // Objectives
  // ==========================================================================

  pub async fn list_objectives(&self) -> ApiResult<Vec<Objective>> {
    self.get("objectives", &[]).await
  }

  pub async fn get_objective(&self, id: u64) -> ApiResult<Objective> {
    self.get(&format!("objectives/{}", id), &[]).await
  }

  pub async fn create_objective(&self, objective: &NewObjective) -> ApiResult<Objective> {
    self.post("objectives", objective).await
  }

  pub async fn delete_objective(&self, id: u64) -> ApiResult<()> {
    self.delete(&format!("objectives/{}", id)).await
  }

  pub async fn set_objective_progress(&self, id: u64, progress: u8) -> ApiResult<Objective> {
    self
      .put(
        &format!("objectives/{}/progress", id),
        &serde_json::json!({ "progress": progress.min(100) }),
      )
      .await
  }

  pub async fn objective_comments(&self, id: u64) -> ApiResult<Vec<Comment>> {
    self.get(&format!("objectives/{}/comments", id), &[]).await
  }

  pub async fn add_objective_comment(&self, id: u64, body: &str) -> ApiResult<Comment> {
    self
      .post(
        &format!("objectives/{}/comments", id),
        &serde_json::json!({ "body": body }),
      )
      .await
  }

  /// Accept an objective. The primary path is the emailed-link endpoint that
  /// takes an opaque token; if that fails the call falls back to the direct
  /// mutation endpoint.
  pub async fn accept_objective(&self, id: u64, token: &str) -> ApiResult<Objective> {
    match self
      .get(
        "objectives/accept",
        &[("token", token.to_string())],
      )
      .await
    {
      Ok(objective) => Ok(objective),
      Err(e) => {
        warn!("accept-by-token failed ({}), falling back to mutation", e);
        self
          .post(&format!("objectives/{}/accept", id), &Value::Null)
          .await
      }
    }
  }

  /// Decline an objective, with the same token-then-mutation fallback as
  /// [`Self::accept_objective`].
  pub async fn decline_objective(&self, id: u64, token: &str) -> ApiResult<Objective> {
    match self
      .get(
        "objectives/decline",
        &[("token", token.to_string())],
      )
      .await
    {
      Ok(objective) => Ok(objective),
      Err(e) => {
        warn!("decline-by-token failed ({}), falling back to mutation", e);
        self
          .post(&format!("objectives/{}/decline", id), &Value::Null)
          .await
      }
    }
  }

  // ==========================================================================
  // Tasks and sub-tasks
  // ==========================================================================

  pub async fn tasks_for_objective(&self, objective_id: u64) -> ApiResult<Vec<Task>> {
    self
      .get("tasks", &[("objectiveId", objective_id.to_string())])
      .await
  }

  pub async fn get_task(&self, id: u64) -> ApiResult<Task> {
    self.get(&format!("tasks/{}", id), &[]).await
  }

  pub async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
    self.post("tasks", task).await
  }

  pub async fn set_task_done(&self, id: u64, done: bool) -> ApiResult<Task> {
    self
      .put(&format!("tasks/{}", id), &serde_json::json!({ "done": done }))
      .await
  }

  pub async fn delete_task(&self, id: u64) -> ApiResult<()> {
    self.delete(&format!("tasks/{}", id)).await
  }

  pub async fn subtasks_for_task(&self, task_id: u64) -> ApiResult<Vec<SubTask>> {
    self.get(&format!("tasks/{}/subtasks", task_id), &[]).await
  }

  pub async fn create_subtask(&self, task_id: u64, title: &str) -> ApiResult<SubTask> {
    self
      .post(
        &format!("tasks/{}/subtasks", task_id),
        &serde_json::json!({ "title": title }),
      )
      .await
  }

  pub async fn set_subtask_done(&self, id: u64, done: bool) -> ApiResult<SubTask> {
    self
      .put(
        &format!("subtasks/{}", id),
        &serde_json::json!({ "done": done }),
      )
      .await
  }

  pub async fn delete_subtask(&self, id: u64) -> ApiResult<()> {
    self.delete(&format!("subtasks/{}", id)).await
  }

  pub async fn task_comments(&self, id: u64) -> ApiResult<Vec<Comment>> {
    self.get(&format!("tasks/{}/comments", id), &[]).await
  }

  pub async fn add_task_comment(&self, id: u64, body: &str) -> ApiResult<Comment> {
    self
      .post(
        &format!("tasks/{}/comments", id),
        &serde_json::json!({ "body": body }),
      )
      .await
  }

  // ==========================================================================
  // Users (admin)
  // ==========================================================================

  pub async fn list_users(&self) -> ApiResult<Vec<User>> {
    self.get("users", &[]).await
  }

  pub async fn create_user(&self, request: &RegisterRequest) -> ApiResult<User> {
    self.post("users", request).await
  }

  pub async fn set_user_role(&self, id: u64, role: Role) -> ApiResult<User> {
    self
      .put(&format!("users/{}/role", id), &serde_json::json!({ "role": role }))
      .await
  }

  pub async fn set_user_department(&self, id: u64, department_id: u64) -> ApiResult<User> {
    self
      .put(
        &format!("users/{}/department", id),
        &serde_json::json!({ "departmentId": department_id }),
      )
      .await
  }

  pub async fn set_user_active(&self, id: u64, active: bool) -> ApiResult<User> {
    self
      .put(
        &format!("users/{}/activation", id),
        &serde_json::json!({ "active": active }),
      )
      .await
  }

  pub async fn delete_user(&self, id: u64) -> ApiResult<()> {
    self.delete(&format!("users/{}", id)).await
  }

  // ==========================================================================
  // Departments (admin)
  // ==========================================================================

  pub async fn list_departments(&self) -> ApiResult<Vec<Department>> {
    self.get("departments", &[]).await
  }

  pub async fn create_department(&self, department: &NewDepartment) -> ApiResult<Department> {
    self.post("departments", department).await
  }

  pub async fn rename_department(&self, id: u64, name: &str) -> ApiResult<Department> {
    self
      .put(
        &format!("departments/{}", id),
        &serde_json::json!({ "name": name }),
      )
      .await
  }

  pub async fn delete_department(&self, id: u64) -> ApiResult<()> {
    self.delete(&format!("departments/{}", id)).await
  }

  // ==========================================================================
  // Notifications
  // ==========================================================================

  pub async fn notifications(&self) -> ApiResult<Vec<Notification>> {
    self.get("notifications", &[]).await
  }

  pub async fn unread_count(&self) -> ApiResult<UnreadCount> {
    self.get("notifications/unread-count", &[]).await
  }

  pub async fn mark_notification_read(&self, id: u64) -> ApiResult<Notification> {
    self
      .put(&format!("notifications/{}/read", id), &Value::Null)
      .await
  }

  pub async fn mark_all_notifications_read(&self) -> ApiResult<()> {
    self
      .request(Method::PUT, "notifications/read-all", &[], None)
      .await?;
    Ok(())
  }

  // ==========================================================================
  // Analytics
  // ==========================================================================

  pub async fn user_rating(&self, user_id: u64) -> ApiResult<RatingSummary> {
    self
      .get(&format!("analytics/users/{}/rating", user_id), &[])
      .await
  }

  pub async fn department_rating(&self, department_id: u64) -> ApiResult<RatingSummary> {
    self
      .get(
        &format!("analytics/departments/{}/rating", department_id),
        &[],
      )
      .await
  }

  pub async fn organization_rating(&self) -> ApiResult<RatingSummary> {
    self.get("analytics/organization/rating", &[]).await
  }
}

fn to_value(body: &impl Serialize) -> ApiResult<Value> {
  serde_json::to_value(body).map_err(|e| ApiError::Network(format!("invalid request body: {}", e)))
}

fn from_value<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
  serde_json::from_value(value)
    .map_err(|e| ApiError::Network(format!("invalid response body: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ApiConfig;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// Serve exactly one HTTP response on a fresh local port, returning the
  /// base URL to point the client at.
  async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
      let Ok((mut socket, _)) = listener.accept().await else {
        return;
      };
      let mut buf = vec![0u8; 8192];
      let mut read = 0;
      // Drain headers plus the declared body before answering.
      loop {
        match socket.read(&mut buf[read..]).await {
          Ok(0) | Err(_) => break,
          Ok(n) => read += n,
        }
        if let Some(end) = buf[..read].windows(4).position(|w| w == b"\r\n\r\n") {
          let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
          let body_len = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
          if read >= end + 4 + body_len {
            break;
          }
        }
        if read == buf.len() {
          break;
        }
      }
      let response = format!(
        "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
      );
      let _ = socket.write_all(response.as_bytes()).await;
    });

    format!("http://{}/api/", addr)
  }

  async fn test_client(base_url: String) -> (ApiClient, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let session =
      SessionStore::open_at(dir.path().join("session.json")).expect("session store opens");
    let config = Config {
      api: ApiConfig { base_url },
      title: None,
      tick_rate_ms: 250,
    };
    let client = ApiClient::new(&config, session).expect("client builds");
    (client, dir)
  }

  #[tokio::test]
  async fn test_forgot_password_ignores_success_body() {
    // Success responses carry a human-readable message, not null
    let base = one_shot_server("HTTP/1.1 200 OK", r#"{"message":"email sent"}"#).await;
    let (client, _dir) = test_client(base).await;

    client
      .forgot_password("ada@example.com")
      .await
      .expect("acknowledged reset is not an error");
  }

  #[tokio::test]
  async fn test_server_error_body_becomes_message() {
    let base =
      one_shot_server("HTTP/1.1 422 Unprocessable Entity", r#"{"message":"unknown email"}"#).await;
    let (client, _dir) = test_client(base).await;

    let err = client.forgot_password("ada@example.com").await.unwrap_err();
    assert_eq!(
      err,
      ApiError::Server {
        status: 422,
        message: "unknown email".into(),
      }
    );
  }
}
