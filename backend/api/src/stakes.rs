//! Stake intake: records off-chain stake intents before they are confirmed
//! on-chain, and lists them per wallet address.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db::{self, NewStake};
use crate::errors::{AppError, Result};
use crate::models::{to_millis, ProjectStatus, Stake, StakeStatus};
use crate::projects;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStakeRequest {
    pub project_id: String,
    pub amount: f64,
    pub address: String,
    pub intent: String,
}

/// Record a pending stake against an active project.
pub async fn create_stake(pool: &SqlitePool, req: CreateStakeRequest) -> Result<Stake> {
    if !req.amount.is_finite() || req.amount < 0.0 {
        return Err(AppError::Validation(
            "amount must be a non-negative number".to_string(),
        ));
    }
    let address = req.address.trim();
    let intent = req.intent.trim();
    if address.is_empty() || intent.is_empty() {
        return Err(AppError::Validation(
            "address and intent are required".to_string(),
        ));
    }

    let project = projects::find(pool, &req.project_id).await?;
    if project.status != ProjectStatus::Active {
        return Err(AppError::InvalidState(format!(
            "Cannot stake on {} project",
            project.status.as_str()
        )));
    }

    let id = Uuid::new_v4().to_string();
    let stake = NewStake {
        id: &id,
        project_id: &project.id,
        amount: req.amount,
        address,
        intent,
        status: StakeStatus::Pending.as_str(),
        timestamp: to_millis(Utc::now()),
    };

    db::insert_stake(pool, &stake).await.map_err(|e| {
        if e.is_unique_violation() {
            AppError::Conflict("Stake intent already submitted".to_string())
        } else {
            e
        }
    })?;

    info!(
        stake_id = %id,
        project_id = %project.id,
        address = %address,
        amount = req.amount,
        "Stake intent recorded"
    );

    let record = db::get_stake(pool, &id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("stake {id} vanished after insert")))?;
    Stake::from_record(record, false)
}

/// All stakes placed from `address`, newest first, each with a summary of
/// its project.
pub async fn list_by_address(pool: &SqlitePool, address: &str) -> Result<Vec<Stake>> {
    db::get_stakes_by_address(pool, address)
        .await?
        .into_iter()
        .map(|r| Stake::from_record(r, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::projects::tests::seed_project;

    fn request(project_id: &str, intent: &str) -> CreateStakeRequest {
        CreateStakeRequest {
            project_id: project_id.to_string(),
            amount: 50.0,
            address: "0xabc".to_string(),
            intent: intent.to_string(),
        }
    }

    #[tokio::test]
    async fn stake_on_active_project_is_pending() {
        let pool = test_pool().await;
        let project_id = seed_project(&pool, "p", "active", 100.0, 0.0, &[], 1).await;

        let stake = create_stake(&pool, request(&project_id, "intent-1"))
            .await
            .unwrap();
        assert_eq!(stake.status, StakeStatus::Pending);
        assert_eq!(stake.project_id, project_id);
        assert_eq!(stake.amount, 50.0);
        assert!(stake.project.is_none());
    }

    #[tokio::test]
    async fn inactive_project_rejects_stake_with_status_in_message() {
        let pool = test_pool().await;
        for status in ["upcoming", "completed"] {
            let project_id = seed_project(&pool, status, status, 100.0, 0.0, &[], 1).await;
            let err = create_stake(&pool, request(&project_id, &format!("intent-{status}")))
                .await
                .unwrap_err();
            match err {
                AppError::InvalidState(msg) => {
                    assert_eq!(msg, format!("Cannot stake on {status} project"))
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(
                db::count_stakes_for_project(&pool, &project_id)
                    .await
                    .unwrap(),
                0
            );
        }
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let pool = test_pool().await;
        let err = create_stake(&pool, request(&Uuid::new_v4().to_string(), "i"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reused_intent_is_a_conflict_and_not_stored_twice() {
        let pool = test_pool().await;
        let project_id = seed_project(&pool, "p", "active", 100.0, 0.0, &[], 1).await;

        create_stake(&pool, request(&project_id, "same"))
            .await
            .unwrap();
        let err = create_stake(&pool, request(&project_id, "same"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            db::count_stakes_for_project(&pool, &project_id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let pool = test_pool().await;
        let project_id = seed_project(&pool, "p", "active", 100.0, 0.0, &[], 1).await;
        let mut req = request(&project_id, "neg");
        req.amount = -1.0;
        assert!(matches!(
            create_stake(&pool, req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn listing_by_address_embeds_project_summary() {
        let pool = test_pool().await;
        let kept = seed_project(&pool, "Kept", "active", 100.0, 0.0, &[], 1).await;
        let gone = seed_project(&pool, "Gone", "active", 100.0, 0.0, &[], 2).await;

        create_stake(&pool, request(&kept, "first")).await.unwrap();
        create_stake(&pool, request(&gone, "second")).await.unwrap();
        let mut other = request(&kept, "third");
        other.address = "0xdef".to_string();
        create_stake(&pool, other).await.unwrap();

        db::delete_project(&pool, &gone).await.unwrap();

        let stakes = list_by_address(&pool, "0xabc").await.unwrap();
        assert_eq!(stakes.len(), 2);
        // Newest first.
        assert_eq!(stakes[0].intent, "second");
        assert_eq!(stakes[0].project, Some(None));
        assert_eq!(stakes[1].intent, "first");
        let summary = stakes[1].project.clone().flatten().unwrap();
        assert_eq!(summary.title, "Kept");
        assert_eq!(summary.status, ProjectStatus::Active);
    }
}
