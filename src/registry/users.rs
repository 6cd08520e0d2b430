use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ConsoleError, ConsoleResult};
use crate::gateway::{segment, ApiRequest};
use crate::identity::{Operation, Role};
use crate::pipeline::timefmt;

use super::Registry;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "is_active")]
    pub active: bool,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timefmt::deserialize")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(rename = "is_active")]
    pub active: bool,
}

impl NewUser {
    pub fn new(email: &str, password: &str, role: Role) -> Self {
        Self { email: email.to_string(), password: password.to_string(), role, active: true }
    }

    fn normalized(mut self) -> ConsoleResult<Self> {
        self.email = self.email.trim().to_lowercase();
        if !self.email.contains('@') || self.email.starts_with('@') || self.email.ends_with('@') {
            return Err(ConsoleError::invalid("Invalid email"));
        }
        check_password(&self.password)?;
        Ok(self)
    }
}

fn check_password(password: &str) -> ConsoleResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ConsoleError::invalid(format!("password must be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}

/// A password edit. There is no way to clear a password.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PasswordChange {
    #[default]
    Unchanged,
    Set(String),
}

impl PasswordChange {
    /// Operator input: blank means leave it alone.
    pub fn from_input(input: &str) -> Self {
        if input.is_empty() { PasswordChange::Unchanged } else { PasswordChange::Set(input.to_string()) }
    }
}

/// Partial user update. Role and active flag are always sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEdit {
    pub role: Role,
    pub active: bool,
    pub password: PasswordChange,
}

impl UserEdit {
    /// Edit that keeps the user as they are; adjust fields from here.
    pub fn from_user(user: &AdminUser) -> Self {
        Self { role: user.role, active: user.active, password: PasswordChange::Unchanged }
    }
}

#[derive(Serialize)]
struct UserPatch<'a> {
    role: Role,
    is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

impl Registry {
    pub async fn list_users(&self, cancel: &CancellationToken) -> ConsoleResult<Vec<AdminUser>> {
        self.client.authorize(Operation::ManageUsers)?;
        self.client.json(&ApiRequest::get("/admin/users").label("Users load"), cancel).await
    }

    pub async fn create_user(&self, user: NewUser, cancel: &CancellationToken) -> ConsoleResult<AdminUser> {
        self.client.authorize(Operation::ManageUsers)?;
        let user = user.normalized()?;
        let req = ApiRequest::post("/admin/users").label("Create user").json(&user)?;
        let created: AdminUser = self.client.json(&req, cancel).await?;
        info!(email = %created.email, role = %created.role, "registry: user created");
        Ok(created)
    }

    pub async fn update_user(&self, user_id: &str, edit: &UserEdit, cancel: &CancellationToken) -> ConsoleResult<AdminUser> {
        self.client.authorize(Operation::ManageUsers)?;
        let password = match &edit.password {
            PasswordChange::Unchanged => None,
            PasswordChange::Set(p) => {
                check_password(p)?;
                Some(p.as_str())
            }
        };
        let patch = UserPatch { role: edit.role, is_active: edit.active, password };
        let req = ApiRequest::patch(format!("/admin/users/{}", segment(user_id))).label("Update user").json(&patch)?;
        let updated: AdminUser = self.client.json(&req, cancel).await?;
        info!(email = %updated.email, password_reset = password.is_some(), "registry: user updated");
        Ok(updated)
    }

    pub async fn delete_user(&self, user_id: &str, cancel: &CancellationToken) -> ConsoleResult<()> {
        self.client.authorize(Operation::ManageUsers)?;
        let req = ApiRequest::delete(format!("/admin/users/{}", segment(user_id))).label("Delete user");
        self.client.unit(&req, cancel).await
    }
}
