//! Admin accounts and owner-scoped project management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminIdentity, TokenIssuer};
use crate::db::{self, ProjectFilter, ProjectOrder};
use crate::errors::{AppError, Result};
use crate::models::{
    deserialize_nullable, deserialize_optional_timestamp, deserialize_timestamp, normalize_tags,
    to_millis, AdminRecord, AdminSummary, Project, ProjectRecord, ProjectStatus,
};
use crate::password;
use crate::projects;

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub admin: AdminSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub deadline: DateTime<Utc>,
    pub staking_conditions: Option<String>,
    pub reward_structure: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Absent fields are left as they are; `id`, `createdBy`
/// and unrecognised keys are ignored. An explicit `null` clears the
/// optional text fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal_amount: Option<f64>,
    pub current_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub deadline: Option<DateTime<Utc>>,
    pub status: Option<ProjectStatus>,
    /// `Some(None)` clears the field.
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub staking_conditions: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub reward_structure: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────
// Accounts
// ─────────────────────────────────────────────────────────

fn identity_of(admin: &AdminRecord) -> AdminIdentity {
    AdminIdentity {
        id: admin.id.clone(),
        username: admin.username.clone(),
        email: admin.email.clone(),
    }
}

async fn hash_blocking(plaintext: String) -> Result<password::HashedPassword> {
    tokio::task::spawn_blocking(move || password::hash(&plaintext))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_blocking(plaintext: String, hash: String, salt: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify(&plaintext, &hash, &salt))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
}

/// Create an admin account and open a session for it.
pub async fn register(
    pool: &SqlitePool,
    tokens: &TokenIssuer,
    req: RegisterRequest,
) -> Result<Session> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "username, email and password are required".to_string(),
        ));
    }

    let conflict = || AppError::Conflict("Admin already exists with that username or email".into());
    if db::find_admin_by_username_or_email(pool, &username, &email)
        .await?
        .is_some()
    {
        return Err(conflict());
    }

    let hashed = hash_blocking(req.password).await?;
    let now = to_millis(Utc::now());
    let admin = AdminRecord {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        password: hashed.hash,
        salt: hashed.salt,
        created_at: now,
        updated_at: now,
    };

    db::insert_admin(pool, &admin).await.map_err(|e| {
        if e.is_unique_violation() {
            conflict()
        } else {
            e
        }
    })?;
    info!(admin_id = %admin.id, username = %admin.username, "Admin registered");

    Ok(Session {
        token: tokens.issue(&identity_of(&admin))?,
        admin: AdminSummary::from(&admin),
    })
}

/// Check credentials and open a session. Unknown email and wrong password
/// produce the same error.
pub async fn login(pool: &SqlitePool, tokens: &TokenIssuer, req: LoginRequest) -> Result<Session> {
    let email = req.email.trim().to_lowercase();
    let admin = db::find_admin_by_email(pool, &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let matches = verify_blocking(req.password, admin.password.clone(), admin.salt.clone()).await?;
    if !matches {
        return Err(AppError::InvalidCredentials);
    }

    Ok(Session {
        token: tokens.issue(&identity_of(&admin))?,
        admin: AdminSummary::from(&admin),
    })
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be a non-negative number"
        )))
    }
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn create_project(
    pool: &SqlitePool,
    caller: &AdminIdentity,
    req: CreateProjectRequest,
) -> Result<Project> {
    let title = required_text("title", &req.title)?;
    if req.description.trim().is_empty() {
        return Err(AppError::Validation("description is required".to_string()));
    }
    check_amount("goalAmount", req.goal_amount)?;

    let now = Utc::now();
    let status = ProjectStatus::from_deadline(req.deadline, now);
    let record = ProjectRecord {
        id: Uuid::new_v4().to_string(),
        title,
        description: req.description,
        goal_amount: req.goal_amount,
        current_amount: 0.0,
        deadline: to_millis(req.deadline),
        status: status.as_str().to_string(),
        created_by: caller.id.clone(),
        staking_conditions: req.staking_conditions,
        reward_structure: req.reward_structure,
        tags: serde_json::to_string(&normalize_tags(&req.tags))?,
        created_at: to_millis(now),
        updated_at: to_millis(now),
    };

    db::insert_project(pool, &record).await?;
    info!(project_id = %record.id, admin_id = %caller.id, status = status.as_str(), "Project created");
    Project::try_from(record)
}

/// Load a project and make sure `caller` created it.
async fn owned_project(
    pool: &SqlitePool,
    caller: &AdminIdentity,
    id: &str,
    action: &str,
) -> Result<Project> {
    let project = projects::find(pool, id).await?;
    if project.created_by != caller.id {
        return Err(AppError::Forbidden(format!(
            "Not authorized to {action} this project"
        )));
    }
    Ok(project)
}

pub async fn update_project(
    pool: &SqlitePool,
    caller: &AdminIdentity,
    id: &str,
    req: UpdateProjectRequest,
) -> Result<Project> {
    let current = owned_project(pool, caller, id, "update").await?;

    let title = match req.title {
        Some(t) => required_text("title", &t)?,
        None => current.title,
    };
    let description = match req.description {
        Some(d) if d.trim().is_empty() => {
            return Err(AppError::Validation("description is required".to_string()))
        }
        Some(d) => d,
        None => current.description,
    };
    let goal_amount = req.goal_amount.unwrap_or(current.goal_amount);
    let current_amount = req.current_amount.unwrap_or(current.current_amount);
    check_amount("goalAmount", goal_amount)?;
    check_amount("currentAmount", current_amount)?;
    let tags = req
        .tags
        .map(|t| normalize_tags(&t))
        .unwrap_or(current.tags);

    let record = ProjectRecord {
        id: current.id,
        title,
        description,
        goal_amount,
        current_amount,
        deadline: to_millis(req.deadline.unwrap_or(current.deadline)),
        status: req.status.unwrap_or(current.status).as_str().to_string(),
        created_by: current.created_by,
        staking_conditions: req
            .staking_conditions
            .unwrap_or(current.staking_conditions),
        reward_structure: req.reward_structure.unwrap_or(current.reward_structure),
        tags: serde_json::to_string(&tags)?,
        created_at: to_millis(current.created_at),
        updated_at: to_millis(Utc::now()),
    };

    db::update_project(pool, &record).await?;
    info!(project_id = %record.id, admin_id = %caller.id, "Project updated");
    Project::try_from(record)
}

pub async fn delete_project(pool: &SqlitePool, caller: &AdminIdentity, id: &str) -> Result<()> {
    let project = owned_project(pool, caller, id, "delete").await?;
    db::delete_project(pool, &project.id).await?;
    info!(project_id = %project.id, admin_id = %caller.id, "Project deleted");
    Ok(())
}

/// Projects created by `caller`, newest first.
pub async fn list_mine(pool: &SqlitePool, caller: &AdminIdentity) -> Result<Vec<Project>> {
    let filter = ProjectFilter {
        created_by: Some(caller.id.clone()),
        ..Default::default()
    };
    db::list_projects(pool, &filter, ProjectOrder::NewestFirst, i64::MAX, 0)
        .await?
        .into_iter()
        .map(Project::try_from)
        .collect()
}
