use tracing::error;

use crate::db::Pool;
use crate::error::{AppError, Result};
use crate::models::User;

pub async fn create(pool: &Pool, id: &str, email: &str, password_hash: &str) -> Result<User> {
    let row = sqlx::query_as::<_, (String, String, String, chrono::DateTime<chrono::Utc>)>(
        r#"
        INSERT INTO users (id, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, email, password_hash, created_at
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            AppError::conflict("email already registered")
        } else {
            error!("failed to create user: {}", e);
            AppError::from(e)
        }
    })?;

    Ok(User {
        id: row.0,
        email: row.1,
        password_hash: row.2,
        created_at: row.3,
    })
}

pub async fn find_by_email(pool: &Pool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, (String, String, String, chrono::DateTime<chrono::Utc>)>(
        r#"SELECT id, email, password_hash, created_at FROM users WHERE email = $1"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| User {
        id: r.0,
        email: r.1,
        password_hash: r.2,
        created_at: r.3,
    }))
}

/// Normalize an email the way signup/login must before uniqueness checks
/// (spec.md §3: "`email` (unique, normalized lowercase/trim)").
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  User@Example.com "), "user@example.com");
    }
}
