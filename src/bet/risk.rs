//! Daily risk window computation.

use chrono::{DateTime, Duration, Timelike, Utc};
use sqlx::SqliteConnection;

use super::errors::{BetError, BetResult};
use super::models::{RiskCheck, RiskConfig};

/// Start of the rolling window containing `now`: the most recent occurrence
/// of the reset hour, UTC.
pub fn window_start(now: DateTime<Utc>, reset_hour_utc: u32) -> DateTime<Utc> {
    let reset = now
        .date_naive()
        .and_hms_opt(reset_hour_utc % 24, 0, 0)
        .expect("reset hour is within 0..24")
        .and_utc();
    if now >= reset {
        reset
    } else {
        reset - Duration::days(1)
    }
}

/// Sum of stakes the user has placed since the window start.
pub async fn risked_since(
    conn: &mut SqliteConnection,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(stake), 0) FROM bets WHERE user_id = ?1 AND created_at >= ?2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(conn)
    .await
}

/// Admit or reject a new stake against the configured ceiling.
///
/// Reports the headroom in both cases so callers can render a precise
/// message.
pub async fn admit(
    conn: &mut SqliteConnection,
    config: &RiskConfig,
    user_id: i64,
    stake: i64,
    now: DateTime<Utc>,
) -> BetResult<RiskCheck> {
    let since = window_start(now, config.reset_hour_utc);
    let risked = risked_since(conn, user_id, since).await?;

    if risked + stake > config.daily_limit {
        return Err(BetError::DailyLimitExceeded {
            limit: config.daily_limit,
            risked,
            remaining: (config.daily_limit - risked).max(0),
        });
    }

    Ok(RiskCheck {
        risked: risked + stake,
        remaining: config.daily_limit - risked - stake,
    })
}
