use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    model::{Account, Password, Prepared},
    repo::AccountStore,
};
use crate::{
    error::{AppError, AppResult},
    schema::ValidationError,
};

/// Account store held in process memory, for tests and local runs.
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: RwLock<HashMap<Uuid, Account>>,
}

fn poisoned() -> AppError {
    anyhow::anyhow!("account store lock poisoned").into()
}

fn without_password(mut a: Account) -> Account {
    a.password = Password::NotLoaded;
    a
}

impl MemoryAccountStore {
    fn email_taken(rows: &HashMap<Uuid, Account>, email: &str, except: Uuid) -> bool {
        rows.values()
            .any(|a| a.id != except && a.email.eq_ignore_ascii_case(email))
    }

    fn find_where(&self, email: &str) -> AppResult<Option<Account>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: &Prepared<Account>) -> AppResult<Account> {
        let a = account.get().clone();
        if a.password.hash().is_none() {
            return Err(anyhow::anyhow!("new account has no password hash").into());
        }
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if Self::email_taken(&rows, &a.email, a.id) || rows.contains_key(&a.id) {
            return Err(ValidationError::duplicate("email").into());
        }
        rows.insert(a.id, a.clone());
        Ok(a)
    }

    async fn update(&self, account: &Prepared<Account>) -> AppResult<Account> {
        let mut a = account.get().clone();
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if Self::email_taken(&rows, &a.email, a.id) {
            return Err(ValidationError::duplicate("email").into());
        }
        let stored = rows
            .get_mut(&a.id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if a.password.hash().is_none() {
            a.password = stored.password.clone();
        }
        *stored = a.clone();
        Ok(without_password(a))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).cloned().map(without_password))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self.find_where(email)?.map(without_password))
    }

    async fn find_by_email_with_password(&self, email: &str) -> AppResult<Option<Account>> {
        self.find_where(email)
    }
}
