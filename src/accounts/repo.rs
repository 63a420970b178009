use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::model::{Account, Password, Prepared, Subscription};
use crate::{
    error::{AppError, AppResult},
    media::Asset,
    schema::ValidationError,
};

/// Persistence for account records.
///
/// Writes only take [`Prepared`] records, so a plaintext password never
/// reaches storage. Default reads leave the password [`Password::NotLoaded`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &Prepared<Account>) -> AppResult<Account>;
    /// Writes the password column only when the record carries a hash.
    async fn update(&self, account: &Prepared<Account>) -> AppResult<Account>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    /// Same as [`AccountStore::find_by_email`] but loads the password hash.
    async fn find_by_email_with_password(&self, email: &str) -> AppResult<Option<Account>>;
}

/// Row of the `users` table.
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    full_name: String,
    email: String,
    #[sqlx(default)]
    password_hash: Option<String>,
    subscription_id: Option<String>,
    subscription_status: Option<String>,
    avatar_public_id: Option<String>,
    avatar_secure_url: Option<String>,
    role: String,
    forgot_password_token: Option<String>,
    forgot_password_expiry: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let subscription = match (r.subscription_id, r.subscription_status) {
            (None, None) => None,
            (id, status) => Some(Subscription { id, status }),
        };
        let avatar = match (r.avatar_public_id, r.avatar_secure_url) {
            (Some(public_id), Some(secure_url)) => Some(Asset {
                public_id,
                secure_url,
            }),
            _ => None,
        };
        let role = r
            .role
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt role {:?} for {}: {}", r.role, r.id, e))?;
        Ok(Account {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            password: r.password_hash.map_or(Password::NotLoaded, Password::Hashed),
            subscription,
            avatar,
            role,
            forgot_password_token: r.forgot_password_token,
            forgot_password_expiry: r.forgot_password_expiry,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const PUBLIC_COLUMNS: &str = "id, full_name, email, subscription_id, subscription_status, \
     avatar_public_id, avatar_secure_url, role, forgot_password_token, forgot_password_expiry, \
     created_at, updated_at";

fn map_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return ValidationError::duplicate("email").into();
        }
    }
    AppError::Internal(anyhow::Error::new(e).context("write user"))
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    #[instrument(skip(self, account), fields(account_id = %account.get().id))]
    async fn insert(&self, account: &Prepared<Account>) -> AppResult<Account> {
        let a = account.get();
        let hash = a
            .password
            .hash()
            .ok_or_else(|| anyhow::anyhow!("new account has no password hash"))?;
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO users (id, full_name, email, password_hash, subscription_id,
                               subscription_status, avatar_public_id, avatar_secure_url, role,
                               forgot_password_token, forgot_password_expiry, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}, password_hash
            "#,
            PUBLIC_COLUMNS
        ))
        .bind(a.id)
        .bind(&a.full_name)
        .bind(&a.email)
        .bind(hash)
        .bind(a.subscription.as_ref().and_then(|s| s.id.clone()))
        .bind(a.subscription.as_ref().and_then(|s| s.status.clone()))
        .bind(a.avatar.as_ref().map(|v| v.public_id.clone()))
        .bind(a.avatar.as_ref().map(|v| v.secure_url.clone()))
        .bind(a.role.as_str())
        .bind(&a.forgot_password_token)
        .bind(a.forgot_password_expiry)
        .bind(a.created_at)
        .bind(a.updated_at)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)?;
        row.try_into()
    }

    #[instrument(skip(self, account), fields(account_id = %account.get().id))]
    async fn update(&self, account: &Prepared<Account>) -> AppResult<Account> {
        let a = account.get();
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE users
               SET full_name = $2, email = $3,
                   password_hash = COALESCE($4, password_hash),
                   subscription_id = $5, subscription_status = $6,
                   avatar_public_id = $7, avatar_secure_url = $8, role = $9,
                   forgot_password_token = $10, forgot_password_expiry = $11,
                   updated_at = $12
             WHERE id = $1
            RETURNING {}
            "#,
            PUBLIC_COLUMNS
        ))
        .bind(a.id)
        .bind(&a.full_name)
        .bind(&a.email)
        .bind(a.password.hash())
        .bind(a.subscription.as_ref().and_then(|s| s.id.clone()))
        .bind(a.subscription.as_ref().and_then(|s| s.status.clone()))
        .bind(a.avatar.as_ref().map(|v| v.public_id.clone()))
        .bind(a.avatar.as_ref().map(|v| v.secure_url.clone()))
        .bind(a.role.as_str())
        .bind(&a.forgot_password_token)
        .bind(a.forgot_password_expiry)
        .bind(a.updated_at)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            PUBLIC_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        row.map(Account::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            PUBLIC_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(Account::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email_with_password(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {}, password_hash FROM users WHERE lower(email) = lower($1)",
            PUBLIC_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user with password")?;
        row.map(Account::try_from).transpose()
    }
}
