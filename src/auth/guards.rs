use async_trait::async_trait;
use axum::http::header;
use tracing::warn;

use crate::{
    accounts::model::Role,
    error::{AppError, AppResult},
    routing::{Guard, RequestContext},
    state::AppState,
};

/// Verifies the bearer token and attaches the caller's identity.
pub struct Authenticated;

#[async_trait]
impl Guard for Authenticated {
    fn name(&self) -> &'static str {
        "authenticated"
    }

    async fn check(&self, state: &AppState, ctx: &mut RequestContext) -> AppResult<()> {
        let auth_header = ctx
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))?;

        let identity = state.keys.verify(token.trim()).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("Invalid or expired token")
        })?;

        ctx.identity = Some(identity);
        Ok(())
    }
}

/// Lets the request through only when the attached identity holds one of
/// `roles`. Must run after [`Authenticated`].
pub struct AuthorizedRoles {
    pub roles: &'static [Role],
}

impl AuthorizedRoles {
    pub fn new(roles: &'static [Role]) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl Guard for AuthorizedRoles {
    fn name(&self) -> &'static str {
        "authorized_roles"
    }

    async fn check(&self, _state: &AppState, ctx: &mut RequestContext) -> AppResult<()> {
        let identity = ctx.identity()?;
        if self.roles.contains(&identity.role) {
            Ok(())
        } else {
            warn!(account_id = %identity.id, role = %identity.role, "role not permitted");
            Err(AppError::Forbidden)
        }
    }
}
