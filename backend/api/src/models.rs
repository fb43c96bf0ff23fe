//! Record types for admins, projects and stakes.
//!
//! Rows are read from SQLite with millisecond timestamps and converted into
//! the serialisable shapes the API returns (RFC 3339 timestamps, camelCase
//! field names, derived `progress`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{AppError, Result};

/// Lifecycle status of an off-chain project record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Upcoming,
    Completed,
}

impl ProjectStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "upcoming" => Some(Self::Upcoming),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
        }
    }

    /// Status a project gets at creation: `upcoming` while the deadline is
    /// still ahead, `active` once it has been reached.
    pub fn from_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if deadline > now {
            Self::Upcoming
        } else {
            Self::Active
        }
    }
}

/// Processing status of a stake intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    Pending,
    Processed,
    Claimed,
}

impl StakeStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "claimed" => Some(Self::Claimed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Claimed => "claimed",
        }
    }
}

/// `currentAmount / goalAmount * 100`, or 0 when there is no goal.
pub fn progress(current_amount: f64, goal_amount: f64) -> f64 {
    if goal_amount > 0.0 {
        current_amount / goal_amount * 100.0
    } else {
        0.0
    }
}

pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| AppError::Internal(format!("timestamp out of range: {ms}")))
}

/// Parse a client-supplied timestamp. Accepts RFC 3339, and
/// `YYYY-MM-DD[THH:MM:SS[.fff]]` (space separator too) read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

const INVALID_TIMESTAMP: &str = "invalid date: expected epoch milliseconds or a date string";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
            Self::Fractional(ms) if ms.is_finite() => {
                Utc.timestamp_millis_opt(ms.trunc() as i64).single()
            }
            Self::Fractional(_) => None,
            Self::Text(s) => parse_timestamp(&s),
        }
    }
}

/// `deserialize_with` for timestamps given as epoch milliseconds or a date string.
pub fn deserialize_timestamp<'de, D>(de: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    RawTimestamp::deserialize(de)?
        .resolve()
        .ok_or_else(|| serde::de::Error::custom(INVALID_TIMESTAMP))
}

/// Optional variant of [`deserialize_timestamp`]; pair with `#[serde(default)]`.
pub fn deserialize_optional_timestamp<'de, D>(
    de: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(de)? {
        Some(raw) => raw
            .resolve()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(INVALID_TIMESTAMP)),
        None => Ok(None),
    }
}

/// Tell an explicit `null` (`Some(None)`) apart from an absent key (`None`).
/// Pair with `#[serde(default)]`.
pub fn deserialize_nullable<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Trim, drop empties and de-duplicate while keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

// ─────────────────────────────────────────────────────────
// Admin
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    /// scrypt hash (hex)
    pub password: String,
    pub salt: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public view of an admin returned alongside session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&AdminRecord> for AdminSummary {
    fn from(r: &AdminRecord) -> Self {
        Self {
            id: r.id.clone(),
            username: r.username.clone(),
            email: r.email.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    pub current_amount: f64,
    pub deadline: i64,
    pub status: String,
    pub created_by: String,
    pub staking_conditions: Option<String>,
    pub reward_structure: Option<String>,
    /// JSON array of tags
    pub tags: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    pub current_amount: f64,
    pub deadline: DateTime<Utc>,
    pub status: ProjectStatus,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staking_conditions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_structure: Option<String>,
    pub tags: Vec<String>,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRecord> for Project {
    type Error = AppError;

    fn try_from(r: ProjectRecord) -> Result<Self> {
        let status = ProjectStatus::parse(&r.status)
            .ok_or_else(|| AppError::Internal(format!("unknown project status {}", r.status)))?;
        Ok(Project {
            progress: progress(r.current_amount, r.goal_amount),
            tags: serde_json::from_str(&r.tags)?,
            deadline: from_millis(r.deadline)?,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
            id: r.id,
            title: r.title,
            description: r.description,
            goal_amount: r.goal_amount,
            current_amount: r.current_amount,
            status,
            created_by: r.created_by,
            staking_conditions: r.staking_conditions,
            reward_structure: r.reward_structure,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Stake
// ─────────────────────────────────────────────────────────

/// Stake row joined with its project's title and status (if it still exists).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StakeRecord {
    pub id: String,
    pub project_id: String,
    pub amount: f64,
    pub address: String,
    pub intent: String,
    pub status: String,
    pub timestamp: i64,
    pub tx_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub project_title: Option<String>,
    pub project_status: Option<String>,
}

/// The slice of a project embedded in stake listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stake {
    pub id: String,
    pub project_id: String,
    pub amount: f64,
    pub address: String,
    pub intent: String,
    pub status: StakeStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Present on listings by address; `null` once the project is deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Option<ProjectSummary>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stake {
    /// Convert a row; `with_project` embeds the joined project summary.
    pub fn from_record(r: StakeRecord, with_project: bool) -> Result<Self> {
        let status = StakeStatus::parse(&r.status)
            .ok_or_else(|| AppError::Internal(format!("unknown stake status {}", r.status)))?;
        let project = if with_project {
            let summary = match (r.project_title, r.project_status) {
                (Some(title), Some(status)) => Some(ProjectSummary {
                    id: r.project_id.clone(),
                    title,
                    status: ProjectStatus::parse(&status).ok_or_else(|| {
                        AppError::Internal(format!("unknown project status {status}"))
                    })?,
                }),
                _ => None,
            };
            Some(summary)
        } else {
            None
        };
        Ok(Stake {
            timestamp: from_millis(r.timestamp)?,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
            id: r.id,
            project_id: r.project_id,
            amount: r.amount,
            address: r.address,
            intent: r.intent,
            status,
            tx_hash: r.tx_hash,
            project,
        })
    }
}
