/// Per-user request rate limiting.
///
/// Fixed one-minute windows counted in Redis, with the base limits from
/// config scaled by the caller's organization rate-limit multiplier. A
/// Redis failure allows the request and logs a warning, so the limiter is
/// never a point of failure.
use crate::config::RateLimitConfig;
use crate::db::directory_repo;
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use redis_utils::RateCounter;
use sqlx::PgPool;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimitService {
    pool: PgPool,
    counter: RateCounter,
    posts_per_minute: u32,
    reads_per_minute: u32,
}

impl RateLimitService {
    pub fn new(pool: PgPool, counter: RateCounter, config: &RateLimitConfig) -> Self {
        Self {
            pool,
            counter,
            posts_per_minute: config.posts_per_minute,
            reads_per_minute: config.reads_per_minute,
        }
    }

    /// Charge one post creation against the caller's window.
    pub async fn check_post(&self, user: &AuthenticatedUser) -> Result<()> {
        self.check(user, "post", self.posts_per_minute).await
    }

    /// Charge one read or light action against the caller's window.
    pub async fn check_read(&self, user: &AuthenticatedUser) -> Result<()> {
        self.check(user, "read", self.reads_per_minute).await
    }

    async fn check(&self, user: &AuthenticatedUser, action: &str, base: u32) -> Result<()> {
        let multiplier = self.organization_multiplier(user).await;
        let limit = effective_limit(base, multiplier);
        let key = format!("feed:rate:{}:{}", action, user.id);

        match self.counter.hit(&key, WINDOW).await {
            Ok(count) if count > limit => Err(AppError::RateLimited(format!(
                "{} requests per minute exceeded",
                limit
            ))),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(key, error = %err, "rate counter unavailable, allowing request");
                Ok(())
            }
        }
    }

    async fn organization_multiplier(&self, user: &AuthenticatedUser) -> f64 {
        match directory_repo::find_organization(&self.pool, user.organization_id).await {
            Ok(Some(org)) => org.rate_limit_multiplier,
            Ok(None) => 1.0,
            Err(err) => {
                tracing::warn!(
                    organization_id = %user.organization_id,
                    error = %err,
                    "organization lookup failed, using base rate limit"
                );
                1.0
            }
        }
    }
}

/// Base limit scaled by the organization multiplier, never below one
/// request per window.
pub fn effective_limit(base: u32, multiplier: f64) -> u64 {
    let scaled = (f64::from(base) * multiplier).floor();
    if scaled < 1.0 {
        1
    } else {
        scaled as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_scales_the_base_limit() {
        assert_eq!(effective_limit(20, 1.0), 20);
        assert_eq!(effective_limit(20, 2.0), 40);
        assert_eq!(effective_limit(100, 0.5), 50);
    }

    #[test]
    fn effective_limit_never_drops_below_one() {
        assert_eq!(effective_limit(20, 0.0), 1);
        assert_eq!(effective_limit(1, 0.4), 1);
    }

    #[test]
    fn fractional_multipliers_round_down() {
        assert_eq!(effective_limit(20, 1.4), 28);
        assert_eq!(effective_limit(3, 0.9), 2);
    }
}
