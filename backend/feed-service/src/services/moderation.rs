use crate::db::moderation_repo;
use crate::error::{AppError, Result};
use crate::models::{Decision, ModerationRecord, ModerationStatus};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Reason recorded when accumulated flags force a post back to review.
pub const FLAG_THRESHOLD_REASON: &str = "flag threshold reached";

/// Applies classifier verdicts, staff reviews, and user flags to the single
/// moderation row each post carries.
pub struct ModerationService {
    pool: PgPool,
    flag_limit: i64,
}

impl ModerationService {
    pub fn new(pool: PgPool, flag_limit: i64) -> Self {
        Self { pool, flag_limit }
    }

    /// Record a classifier verdict for a post inside the caller's
    /// transaction. The latest decision overwrites any earlier one.
    pub async fn apply_verdict(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        decision: Decision,
        score: f64,
    ) -> Result<ModerationRecord> {
        let reason = format!("classifier score {:.2}", score);
        let record = moderation_repo::upsert_decision(
            tx,
            post_id,
            decision.status().as_str(),
            &reason,
            None,
        )
        .await?;

        Ok(record)
    }

    /// Current moderation record of a post.
    pub async fn record_for(&self, post_id: Uuid) -> Result<Option<ModerationRecord>> {
        Ok(moderation_repo::find_by_post(&self.pool, post_id).await?)
    }

    /// Record a staff review decision.
    pub async fn apply_review(
        &self,
        post_id: Uuid,
        status: ModerationStatus,
        reason: &str,
        reviewer: Uuid,
    ) -> Result<ModerationRecord> {
        let mut tx = self.pool.begin().await?;
        let record = moderation_repo::upsert_decision(
            &mut tx,
            post_id,
            status.as_str(),
            reason,
            Some(reviewer),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            post_id = %post_id,
            status = status.as_str(),
            reviewer = %reviewer,
            "moderation review applied"
        );

        Ok(record)
    }

    /// Register a user flag on a post.
    ///
    /// Insert, count, and the possible escalation to pending run in one
    /// transaction, so two racing flags cannot both miss the threshold.
    /// Flagging the same post twice yields a conflict.
    pub async fn register_flag(&self, post_id: Uuid, user_id: Uuid) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = moderation_repo::insert_flag(&mut tx, post_id, user_id).await {
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.is_unique_violation() {
                    return Err(AppError::AlreadyFlagged);
                }
            }
            return Err(err.into());
        }

        let count = moderation_repo::count_flags(&mut tx, post_id).await?;
        let current = moderation_repo::status_for_update(&mut tx, post_id)
            .await?
            .and_then(|s| ModerationStatus::parse(&s));

        if should_escalate(count, self.flag_limit, current) {
            moderation_repo::upsert_decision(
                &mut tx,
                post_id,
                ModerationStatus::Pending.as_str(),
                FLAG_THRESHOLD_REASON,
                None,
            )
            .await?;
            tracing::info!(post_id = %post_id, flags = count, "post escalated to pending review");
        }

        tx.commit().await?;

        Ok(count)
    }
}

/// A post goes back to pending once its flag count reaches the limit, unless
/// it already sits in the review queue.
fn should_escalate(count: i64, limit: i64, current: Option<ModerationStatus>) -> bool {
    count >= limit && current != Some(ModerationStatus::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_at_the_limit() {
        assert!(should_escalate(3, 3, Some(ModerationStatus::Approved)));
    }

    #[test]
    fn does_not_escalate_below_the_limit() {
        assert!(!should_escalate(2, 3, Some(ModerationStatus::Approved)));
    }

    #[test]
    fn pending_posts_are_not_escalated_again() {
        assert!(!should_escalate(5, 3, Some(ModerationStatus::Pending)));
    }

    #[test]
    fn escalates_rejected_posts_back_to_review() {
        assert!(should_escalate(3, 3, Some(ModerationStatus::Rejected)));
    }

    #[test]
    fn missing_moderation_row_still_escalates() {
        assert!(should_escalate(3, 3, None));
    }
}
