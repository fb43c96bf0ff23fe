//! Public project queries: filtered, sorted, paginated listings and
//! single-project detail.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{self, ProjectFilter, ProjectOrder};
use crate::errors::{AppError, Result};
use crate::models::{progress, Project};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort keys accepted by `GET /api/projects?sort=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Newest,
    Goal,
    Progress,
    Deadline,
}

impl SortKey {
    /// Unknown values fall back to [`SortKey::Newest`].
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("goal") => Self::Goal,
            Some("progress") => Self::Progress,
            Some("deadline") => Self::Deadline,
            _ => Self::Newest,
        }
    }

    fn order(&self) -> ProjectOrder {
        match self {
            Self::Newest => ProjectOrder::NewestFirst,
            Self::Goal => ProjectOrder::GoalDesc,
            // Ranked by raised amount, matching the dashboard's "most funded" view.
            Self::Progress => ProjectOrder::CurrentAmountDesc,
            Self::Deadline => ProjectOrder::DeadlineAsc,
        }
    }
}

/// Raw query string of a project listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub project: Project,
    pub total_stakers: i64,
    pub progress: f64,
}

/// `ceil(total / limit)`; `limit` is always ≥ 1 here.
pub fn page_count(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// List projects matching `params`.
pub async fn list(pool: &SqlitePool, params: ListParams) -> Result<ProjectPage> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let sort = SortKey::parse(params.sort.as_deref());

    let filter = ProjectFilter {
        status: non_empty(params.status),
        tag: non_empty(params.tag),
        created_by: None,
    };

    let offset = (page - 1).saturating_mul(limit);
    let rows = db::list_projects(pool, &filter, sort.order(), limit, offset).await?;
    let total = db::count_projects(pool, &filter).await?;

    let projects = rows
        .into_iter()
        .map(Project::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(ProjectPage {
        projects,
        pagination: Pagination {
            total,
            page,
            pages: page_count(total, limit),
        },
    })
}

/// Look up a project and attach its confirmed staker count and live progress.
pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<ProjectDetail> {
    let project = find(pool, id).await?;
    let total_stakers = db::count_confirmed_stakers(pool, &project.id).await?;
    let progress = progress(project.current_amount, project.goal_amount);
    Ok(ProjectDetail {
        project,
        total_stakers,
        progress,
    })
}

/// Fetch a project, mapping missing rows and malformed ids to NotFound.
pub async fn find(pool: &SqlitePool, id: &str) -> Result<Project> {
    let not_found = || AppError::NotFound("Project not found".to_string());
    if Uuid::parse_str(id).is_err() {
        return Err(not_found());
    }
    db::get_project(pool, id)
        .await?
        .ok_or_else(not_found)?
        .try_into()
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::db::{test_pool, NewStake};
    use crate::models::{to_millis, ProjectRecord};

    pub(crate) async fn seed_project(
        pool: &SqlitePool,
        title: &str,
        status: &str,
        goal: f64,
        current: f64,
        tags: &[&str],
        created_at: i64,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let record = ProjectRecord {
            id: id.clone(),
            title: title.to_string(),
            description: format!("{title} description"),
            goal_amount: goal,
            current_amount: current,
            deadline: to_millis(Utc::now() + Duration::days(30)),
            status: status.to_string(),
            created_by: "seed-admin".to_string(),
            staking_conditions: None,
            reward_structure: None,
            tags: serde_json::to_string(tags).unwrap(),
            created_at,
            updated_at: created_at,
        };
        db::insert_project(pool, &record).await.unwrap();
        id
    }

    pub(crate) async fn set_deadline(pool: &SqlitePool, id: &str, deadline: DateTime<Utc>) {
        sqlx::query("UPDATE projects SET deadline = ?1 WHERE id = ?2")
            .bind(to_millis(deadline))
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[test]
    fn sort_key_parsing() {
        assert_eq!(SortKey::parse(None), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("goal")), SortKey::Goal);
        assert_eq!(SortKey::parse(Some("progress")), SortKey::Progress);
        assert_eq!(SortKey::parse(Some("deadline")), SortKey::Deadline);
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Newest);
    }

    #[test]
    fn page_count_is_ceiling() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(7, 1), 7);
    }

    #[tokio::test]
    async fn second_page_returns_records_eleven_to_twenty() {
        let pool = test_pool().await;
        for i in 0..25 {
            seed_project(&pool, &format!("p{i:02}"), "active", 100.0, 0.0, &[], i).await;
        }

        let page = list(
            &pool,
            ListParams {
                page: Some(2),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Newest first: p24 .. p00, so page 2 is p14 .. p05.
        let titles: Vec<_> = page.projects.iter().map(|p| p.title.as_str()).collect();
        let expected: Vec<String> = (5..15).rev().map(|i| format!("p{i:02}")).collect();
        assert_eq!(titles, expected);
        assert_eq!(
            page.pagination,
            Pagination {
                total: 25,
                page: 2,
                pages: 3
            }
        );
    }

    #[tokio::test]
    async fn filters_are_and_combined() {
        let pool = test_pool().await;
        seed_project(&pool, "a", "active", 100.0, 0.0, &["defi"], 1).await;
        seed_project(&pool, "b", "upcoming", 100.0, 0.0, &["defi"], 2).await;
        seed_project(&pool, "c", "active", 100.0, 0.0, &["nft"], 3).await;

        let page = list(
            &pool,
            ListParams {
                status: Some("active".to_string()),
                tag: Some("defi".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.projects.len(), 1);
        assert_eq!(page.projects[0].title, "a");
        assert_eq!(page.pagination.total, 1);

        let unknown = list(
            &pool,
            ListParams {
                status: Some("archived".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(unknown.projects.is_empty());
    }

    #[tokio::test]
    async fn sort_orders() {
        let pool = test_pool().await;
        seed_project(&pool, "small", "active", 10.0, 9.0, &[], 1).await;
        seed_project(&pool, "big", "active", 1000.0, 50.0, &[], 2).await;
        seed_project(&pool, "mid", "active", 100.0, 20.0, &[], 3).await;

        let titles = |sort: &str| {
            let pool = pool.clone();
            let sort = sort.to_string();
            async move {
                list(
                    &pool,
                    ListParams {
                        sort: Some(sort),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
                .projects
                .into_iter()
                .map(|p| p.title)
                .collect::<Vec<_>>()
            }
        };

        assert_eq!(titles("newest").await, vec!["mid", "big", "small"]);
        assert_eq!(titles("goal").await, vec!["big", "mid", "small"]);
        assert_eq!(titles("progress").await, vec!["big", "mid", "small"]);
    }

    #[tokio::test]
    async fn deadline_sort_is_soonest_first() {
        let pool = test_pool().await;
        let now = Utc::now();
        let late = seed_project(&pool, "late", "active", 100.0, 0.0, &[], 1).await;
        let early = seed_project(&pool, "early", "active", 100.0, 0.0, &[], 2).await;
        let mid = seed_project(&pool, "mid", "active", 100.0, 0.0, &[], 3).await;
        set_deadline(&pool, &late, now + Duration::days(30)).await;
        set_deadline(&pool, &early, now + Duration::days(2)).await;
        set_deadline(&pool, &mid, now + Duration::days(10)).await;

        let page = list(
            &pool,
            ListParams {
                sort: Some("deadline".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let titles: Vec<_> = page.projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "mid", "late"]);
    }

    #[tokio::test]
    async fn out_of_range_paging_is_clamped() {
        let pool = test_pool().await;
        seed_project(&pool, "only", "active", 1.0, 0.0, &[], 1).await;
        let page = list(
            &pool,
            ListParams {
                page: Some(0),
                limit: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.pagination.pages, 1);
        assert_eq!(page.projects.len(), 1);
    }

    #[tokio::test]
    async fn detail_counts_only_confirmed_stakers() {
        let pool = test_pool().await;
        let id = seed_project(&pool, "p", "active", 1000.0, 250.0, &[], 1).await;

        for (n, status) in ["pending", "processed", "claimed"].iter().enumerate() {
            let stake_id = format!("s{n}");
            let intent = format!("i{n}");
            db::insert_stake(
                &pool,
                &NewStake {
                    id: &stake_id,
                    project_id: &id,
                    amount: 1.0,
                    address: "addr",
                    intent: &intent,
                    status: "pending",
                    timestamp: n as i64,
                },
            )
            .await
            .unwrap();
            db::set_stake_status(&pool, &stake_id, status).await;
        }

        let detail = get_by_id(&pool, &id).await.unwrap();
        assert_eq!(detail.total_stakers, 2);
        assert_eq!(detail.progress, 25.0);
    }

    #[tokio::test]
    async fn zero_goal_has_zero_progress() {
        let pool = test_pool().await;
        let id = seed_project(&pool, "p", "active", 0.0, 0.0, &[], 1).await;
        let detail = get_by_id(&pool, &id).await.unwrap();
        assert_eq!(detail.progress, 0.0);
        assert_eq!(detail.project.progress, 0.0);
    }

    #[tokio::test]
    async fn unknown_or_malformed_id_is_not_found() {
        let pool = test_pool().await;
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            get_by_id(&pool, &missing).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_by_id(&pool, "not-a-uuid").await,
            Err(AppError::NotFound(_))
        ));
    }
}
