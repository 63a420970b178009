use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    error::AppError,
    media::Asset,
    schema::{FieldSpec, FieldValues, Schema, ValidationError},
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#
    )
    .expect("email regex compiles");

    /// Field constraints of an account record.
    pub static ref ACCOUNT_SCHEMA: Schema = Schema {
        fields: vec![
            FieldSpec::text("fullName")
                .required("Name is required")
                .trim()
                .lowercase()
                .min_len(5, "Name must be at least 5 characters")
                .max_len(25, "Name must not exceed 25 characters"),
            FieldSpec::text("email")
                .required("Email is required")
                .trim()
                .lowercase()
                .pattern(&EMAIL_RE, "Please fill in a valid email address"),
            FieldSpec::text("password")
                .required("Password is required")
                .min_len(8, "Password must be at least 8 characters"),
            FieldSpec::text("role")
                .default_value(Role::User.as_str())
                .one_of(Role::ALL, "Role must be USER or ADMIN"),
        ],
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const ALL: &'static [&'static str] = &["USER", "ADMIN"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(ValidationError::field("role", "Role must be USER or ADMIN")),
        }
    }
}

/// External billing subscription snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Password slot of an account.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    /// Left out by default reads.
    NotLoaded,
    /// Stored one-way hash.
    Hashed(String),
    /// Plaintext set since the record was loaded; hashed on the next save.
    Changed(String),
}

impl Password {
    pub fn hash(&self) -> Option<&str> {
        match self {
            Password::Hashed(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::NotLoaded => f.write_str("NotLoaded"),
            Password::Hashed(_) => f.write_str("Hashed(..)"),
            Password::Changed(_) => f.write_str("Changed(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password: Password,
    pub subscription: Option<Subscription>,
    pub avatar: Option<Asset>,
    pub role: Role,
    pub forgot_password_token: Option<String>,
    pub forgot_password_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Unsaved account as submitted at registration.
    pub fn new_registration(full_name: &str, email: &str, password: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: Password::Changed(password.to_string()),
            subscription: None,
            avatar: None,
            role: Role::default(),
            forgot_password_token: None,
            forgot_password_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_password(&mut self, plain: &str) {
        self.password = Password::Changed(plain.to_string());
    }

    /// Normalizes fields in place and checks them against [`ACCOUNT_SCHEMA`].
    /// The password is only checked while it is still plaintext.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let mut values = FieldValues::new();
        values.insert("fullName", Some(self.full_name.clone()));
        values.insert("email", Some(self.email.clone()));
        values.insert("role", Some(self.role.as_str().to_string()));
        match &self.password {
            Password::Changed(plain) => {
                values.insert("password", Some(plain.clone()));
            }
            Password::NotLoaded | Password::Hashed(_) => {}
        }

        ACCOUNT_SCHEMA.apply(&mut values)?;

        if let Some(Some(v)) = values.remove("fullName") {
            self.full_name = v;
        }
        if let Some(Some(v)) = values.remove("email") {
            self.email = v;
        }
        if let Some(Some(v)) = values.remove("role") {
            self.role = v.parse()?;
        }
        Ok(())
    }
}

/// A record that passed validation and holds no plaintext password.
/// Stores only accept this type.
#[derive(Debug, Clone)]
pub struct Prepared<T>(T);

impl<T> Prepared<T> {
    pub fn get(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Validates `account` and hashes its password if, and only if, it changed
/// since the record was loaded. An already hashed password is kept as is.
pub fn prepare_for_persistence(mut account: Account) -> Result<Prepared<Account>, AppError> {
    account.validate()?;
    if let Password::Changed(plain) = &account.password {
        let hash = hash_password(plain)?;
        account.password = Password::Hashed(hash);
    }
    account.updated_at = OffsetDateTime::now_utc();
    Ok(Prepared(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;

    fn registration(name: &str) -> Account {
        Account::new_registration(name, "Student@Example.com", "correct-horse")
    }

    #[test]
    fn normalizes_name_and_email() {
        let mut acc = Account::new_registration("  Ada Lovelace ", " ADA@Example.COM ", "password123");
        acc.validate().unwrap();
        assert_eq!(acc.full_name, "ada lovelace");
        assert_eq!(acc.email, "ada@example.com");
        assert_eq!(acc.role, Role::User);
    }

    #[test]
    fn full_name_length_bounds() {
        assert_eq!(
            registration(" abcd ").validate().unwrap_err().field_name(),
            "fullName"
        );
        assert!(registration("abcde").validate().is_ok());
        assert!(registration(&"a".repeat(25)).validate().is_ok());
        assert_eq!(
            registration(&"a".repeat(26)).validate().unwrap_err().field_name(),
            "fullName"
        );
    }

    #[test]
    fn rejects_malformed_email() {
        for email in ["plainaddress", "a@b", "a b@example.com", "@example.com", "a@example.c"] {
            let mut acc = Account::new_registration("valid name", email, "password123");
            assert_eq!(acc.validate().unwrap_err().field_name(), "email", "{email}");
        }
        for email in ["a.b@example.com", "x@[10.0.0.1]", "\"quoted\"@example.org"] {
            let mut acc = Account::new_registration("valid name", email, "password123");
            assert!(acc.validate().is_ok(), "{email}");
        }
    }

    #[test]
    fn rejects_short_password_only_when_plaintext() {
        let mut acc = Account::new_registration("valid name", "a@example.com", "short");
        assert_eq!(acc.validate().unwrap_err().field_name(), "password");

        acc.password = Password::Hashed("$argon2id$stub".into());
        assert!(acc.validate().is_ok());
    }

    #[test]
    fn prepare_hashes_changed_password() {
        let prepared = prepare_for_persistence(registration("valid name")).unwrap();
        let hash = prepared.get().password.hash().expect("hashed").to_string();
        assert_ne!(hash, "correct-horse");
        assert!(verify_password("correct-horse", &hash).unwrap());
    }

    #[test]
    fn prepare_twice_does_not_rehash() {
        let first = prepare_for_persistence(registration("valid name")).unwrap().into_inner();
        let hash = first.password.hash().unwrap().to_string();
        let second = prepare_for_persistence(first).unwrap().into_inner();
        assert_eq!(second.password.hash().unwrap(), hash);
    }

    #[test]
    fn prepare_leaves_unloaded_password_alone() {
        let mut acc = registration("valid name");
        acc.password = Password::NotLoaded;
        let prepared = prepare_for_persistence(acc).unwrap();
        assert_eq!(prepared.get().password, Password::NotLoaded);
    }

    #[test]
    fn set_password_marks_modified() {
        let mut acc = prepare_for_persistence(registration("valid name")).unwrap().into_inner();
        assert!(matches!(acc.password, Password::Hashed(_)));
        acc.set_password("another-secret");
        assert!(matches!(acc.password, Password::Changed(_)));
        let old = acc.clone();
        let rehashed = prepare_for_persistence(acc).unwrap().into_inner();
        assert!(verify_password("another-secret", rehashed.password.hash().unwrap()).unwrap());
        assert_ne!(old.password, rehashed.password);
    }

    #[test]
    fn role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}
