//! Database layer: connection pool, migrations and queries.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqlitePool,
};
use tracing::info;

use crate::errors::Result;
use crate::models::{AdminRecord, ProjectRecord, StakeRecord};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Admins
// ─────────────────────────────────────────────────────────

pub async fn insert_admin(pool: &SqlitePool, admin: &AdminRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO admins (id, username, email, password, salt, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&admin.id)
    .bind(&admin.username)
    .bind(&admin.email)
    .bind(&admin.password)
    .bind(&admin.salt)
    .bind(admin.created_at)
    .bind(admin.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Find an admin holding either the given username or the given email.
pub async fn find_admin_by_username_or_email(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<Option<AdminRecord>> {
    let row = sqlx::query_as::<_, AdminRecord>(
        r#"
        SELECT id, username, email, password, salt, created_at, updated_at
        FROM   admins
        WHERE  username = ?1 OR email = ?2
        LIMIT  1
        "#,
    )
    .bind(username)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_admin_by_email(pool: &SqlitePool, email: &str) -> Result<Option<AdminRecord>> {
    let row = sqlx::query_as::<_, AdminRecord>(
        r#"
        SELECT id, username, email, password, salt, created_at, updated_at
        FROM   admins
        WHERE  email = ?1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
pub async fn count_admins(pool: &SqlitePool) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

const PROJECT_COLUMNS: &str = "id, title, description, goal_amount, current_amount, deadline, \
     status, created_by, staking_conditions, reward_structure, tags, created_at, updated_at";

/// Column to order project listings by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOrder {
    NewestFirst,
    GoalDesc,
    CurrentAmountDesc,
    DeadlineAsc,
}

impl ProjectOrder {
    fn sql(&self) -> &'static str {
        match self {
            Self::NewestFirst => " ORDER BY created_at DESC, rowid DESC",
            Self::GoalDesc => " ORDER BY goal_amount DESC, rowid ASC",
            Self::CurrentAmountDesc => " ORDER BY current_amount DESC, rowid ASC",
            Self::DeadlineAsc => " ORDER BY deadline ASC, rowid ASC",
        }
    }
}

/// AND-combined filters for project listings. `None` imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub created_by: Option<String>,
}

fn push_project_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProjectFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = &filter.status {
        qb.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(projects.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
    if let Some(created_by) = &filter.created_by {
        qb.push(" AND created_by = ").push_bind(created_by.clone());
    }
}

pub async fn insert_project(pool: &SqlitePool, project: &ProjectRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects
            (id, title, description, goal_amount, current_amount, deadline, status,
             created_by, staking_conditions, reward_structure, tags, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(&project.description)
    .bind(project.goal_amount)
    .bind(project.current_amount)
    .bind(project.deadline)
    .bind(&project.status)
    .bind(&project.created_by)
    .bind(&project.staking_conditions)
    .bind(&project.reward_structure)
    .bind(&project.tags)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrite every mutable column of an existing project. `id` and
/// `created_by` are never touched.
pub async fn update_project(pool: &SqlitePool, project: &ProjectRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET    title = ?2, description = ?3, goal_amount = ?4, current_amount = ?5,
               deadline = ?6, status = ?7, staking_conditions = ?8, reward_structure = ?9,
               tags = ?10, updated_at = ?11
        WHERE  id = ?1
        "#,
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(&project.description)
    .bind(project.goal_amount)
    .bind(project.current_amount)
    .bind(project.deadline)
    .bind(&project.status)
    .bind(&project.staking_conditions)
    .bind(&project.reward_structure)
    .bind(&project.tags)
    .bind(project.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_project(pool: &SqlitePool, id: &str) -> Result<u64> {
    let affected = sqlx::query("DELETE FROM projects WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected)
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> Result<Option<ProjectRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(PROJECT_COLUMNS)
        .push(" FROM projects WHERE id = ")
        .push_bind(id);
    let row = qb
        .build_query_as::<ProjectRecord>()
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Fetch one page of projects matching `filter`.
pub async fn list_projects(
    pool: &SqlitePool,
    filter: &ProjectFilter,
    order: ProjectOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProjectRecord>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(PROJECT_COLUMNS).push(" FROM projects");
    push_project_filter(&mut qb, filter);
    qb.push(order.sql());
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb.build_query_as::<ProjectRecord>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn count_projects(pool: &SqlitePool, filter: &ProjectFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
    push_project_filter(&mut qb, filter);
    let (n,) = qb.build_query_as::<(i64,)>().fetch_one(pool).await?;
    Ok(n)
}

/// Move `upcoming` projects whose deadline has passed to `active`.
/// Returns the number of rows changed.
pub async fn activate_due_projects(pool: &SqlitePool, now_ms: i64) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE projects
        SET    status = 'active', updated_at = ?1
        WHERE  status = 'upcoming' AND deadline <= ?1
        "#,
    )
    .bind(now_ms)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected)
}

// ─────────────────────────────────────────────────────────
// Stakes
// ─────────────────────────────────────────────────────────

pub struct NewStake<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub amount: f64,
    pub address: &'a str,
    pub intent: &'a str,
    pub status: &'a str,
    pub timestamp: i64,
}

/// Insert a stake. A reused `intent` surfaces as a unique violation.
pub async fn insert_stake(pool: &SqlitePool, stake: &NewStake<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stakes
            (id, project_id, amount, address, intent, status, timestamp, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?7)
        "#,
    )
    .bind(stake.id)
    .bind(stake.project_id)
    .bind(stake.amount)
    .bind(stake.address)
    .bind(stake.intent)
    .bind(stake.status)
    .bind(stake.timestamp)
    .execute(pool)
    .await?;
    Ok(())
}

const STAKE_SELECT: &str = r#"
    SELECT s.id, s.project_id, s.amount, s.address, s.intent, s.status, s.timestamp,
           s.tx_hash, s.created_at, s.updated_at,
           p.title  AS project_title,
           p.status AS project_status
    FROM   stakes s
    LEFT   JOIN projects p ON p.id = s.project_id
"#;

pub async fn get_stake(pool: &SqlitePool, id: &str) -> Result<Option<StakeRecord>> {
    let row = sqlx::query_as::<_, StakeRecord>(&format!("{STAKE_SELECT} WHERE s.id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// All stakes placed from `address`, newest first.
pub async fn get_stakes_by_address(pool: &SqlitePool, address: &str) -> Result<Vec<StakeRecord>> {
    let rows = sqlx::query_as::<_, StakeRecord>(&format!(
        "{STAKE_SELECT} WHERE s.address = ?1 ORDER BY s.created_at DESC, s.rowid DESC"
    ))
    .bind(address)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Count stakes on a project that have been confirmed on-chain.
pub async fn count_confirmed_stakers(pool: &SqlitePool, project_id: &str) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM   stakes
        WHERE  project_id = ?1 AND status IN ('processed', 'claimed')
        "#,
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;
    Ok(n)
}

#[cfg(test)]
pub async fn count_stakes_for_project(pool: &SqlitePool, project_id: &str) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stakes WHERE project_id = ?1")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    init_pool("sqlite::memory:").await.unwrap()
}

#[cfg(test)]
pub(crate) async fn set_stake_status(pool: &SqlitePool, id: &str, status: &str) {
    sqlx::query("UPDATE stakes SET status = ?2 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
}
