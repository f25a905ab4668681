use crate::db::Pool;
use crate::error::Result;
use crate::models::{DayType, TimePreference};

/// Upsert the running mean for one `(userId, hourSlot, dayType, category)`
/// cell from one request's accumulated `{sum, count}` contribution (spec.md
/// §4.4 step 5, §8 invariant 8): `newCount = sampleCount + count`,
/// `avgEngagement = (avgEngagement*sampleCount + sum) / newCount`.
pub async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    hour_slot: i16,
    day_type: DayType,
    category: &str,
    engagement_sum: f64,
    count: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO time_preferences (user_id, hour_slot, day_type, category, avg_engagement, sample_count, updated_at)
        VALUES ($1, $2, $3, $4, $5 / $6, $6, now())
        ON CONFLICT (user_id, hour_slot, day_type, category) DO UPDATE SET
            avg_engagement = (time_preferences.avg_engagement * time_preferences.sample_count + $5)
                / (time_preferences.sample_count + $6),
            sample_count = time_preferences.sample_count + $6,
            updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(hour_slot)
    .bind(day_type.as_str())
    .bind(category)
    .bind(engagement_sum)
    .bind(count)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// All time-preference rows for a user (spec.md §4.1 time-of-day signal
/// looks these up per `(hourSlot, dayType, category)`).
pub async fn list_for_user(pool: &Pool, user_id: &str) -> Result<Vec<TimePreference>> {
    let rows: Vec<(String, i16, String, String, f64, i64, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            r#"
            SELECT user_id, hour_slot, day_type, category, avg_engagement, sample_count, updated_at
            FROM time_preferences WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| TimePreference {
            user_id: r.0,
            hour_slot: r.1,
            day_type: if r.2 == "weekend" {
                DayType::Weekend
            } else {
                DayType::Weekday
            },
            category: r.3,
            avg_engagement: r.4,
            sample_count: r.5,
            updated_at: r.6,
        })
        .collect())
}
