use super::{DBClient, contains_pattern, page_offset};
use crate::dtos::UpdateUserDto;
use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, is_superuser, \
     confirmation_code, code_expires_at, last_login, self_registered, created_at, updated_at";

/// Fields of a user being created, by signup or by an admin
#[derive(Debug, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub bio: &'a str,
    pub role: UserRole,
    pub confirmation_code: Option<&'a str>, // already hashed
    pub code_expires_at: Option<DateTime<Utc>>,
    pub self_registered: bool,
}

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID, username or email
    /// Returns Option - Some(user) if found, None if not found
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Page of users ordered by username, optionally filtered by a username substring
    async fn get_users(
        &self,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    async fn save_user(&self, new_user: NewUser<'_>) -> Result<User, sqlx::Error>;

    /// Apply the present fields of `changes`; `role` is passed separately so
    /// callers decide whether the role may change at all
    async fn update_user(
        &self,
        user_id: Uuid,
        changes: &UpdateUserDto,
        role: Option<UserRole>,
    ) -> Result<User, sqlx::Error>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Store the hash of a freshly mailed confirmation code
    async fn set_confirmation_code(
        &self,
        user_id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Clear the code and stamp `last_login`, but only if the stored hash is
    /// still `code_hash`. Returns false when another request got there first.
    async fn consume_confirmation_code(
        &self,
        user_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, sqlx::Error>;

    /// Delete self-registered plain users that never exchanged their (now
    /// expired) code; admin-created accounts are kept
    async fn purge_stale_signups(&self) -> Result<u64, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE id = $1",
                USER_COLUMNS
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE username = $1",
                USER_COLUMNS
            ))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {} FROM users WHERE email = $1",
                USER_COLUMNS
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        page: i64,
        limit: i64,
        search: Option<&str>,
    ) -> Result<Vec<User>, sqlx::Error> {
        let offset = page_offset(page, limit);

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 ESCAPE '\')
            ORDER BY username
            LIMIT $2 OFFSET $3
            "#,
            USER_COLUMNS
        ))
        .bind(search.map(contains_pattern))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 ESCAPE '\')
            "#,
        )
        .bind(search.map(contains_pattern))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user(&self, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, bio, role, confirmation_code, code_expires_at, self_registered)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(new_user.first_name)
        .bind(new_user.last_name)
        .bind(new_user.bio)
        .bind(new_user.role)
        .bind(new_user.confirmation_code)
        .bind(new_user.code_expires_at)
        .bind(new_user.self_registered)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        changes: &UpdateUserDto,
        role: Option<UserRole>,
    ) -> Result<User, sqlx::Error> {
        // fetch_one turns a missing user into RowNotFound
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                bio = COALESCE($5, bio),
                role = COALESCE($6, role),
                updated_at = NOW()
            WHERE id = $7
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.bio.as_deref())
        .bind(role)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn set_confirmation_code(
        &self,
        user_id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET confirmation_code = $1, code_expires_at = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(code_hash)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn consume_confirmation_code(
        &self,
        user_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET confirmation_code = NULL,
                code_expires_at = NULL,
                last_login = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND confirmation_code = $2
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge_stale_signups(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE last_login IS NULL
                AND role = 'user'
                AND is_superuser = FALSE
                AND self_registered
                AND code_expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
