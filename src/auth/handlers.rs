use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, instrument, warn};

use crate::{
    accounts::{prepare_for_persistence, Account},
    auth::{
        dto::{Ack, AuthResponse, ChangePasswordRequest, LoginRequest, MeResponse, PublicUser, RegisterRequest},
        password::verify_password,
    },
    error::{AppError, AppResult},
    media::{remove_assets, save_upload},
    routing::RequestContext,
    state::AppState,
};

#[instrument(skip_all)]
pub async fn register(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let payload: RegisterRequest = ctx.payload().await?;
    let mut account = Account::new_registration(
        payload.full_name.as_deref().unwrap_or_default(),
        payload.email.as_deref().unwrap_or_default(),
        payload.password.as_deref().unwrap_or_default(),
    );

    // reject bad input before anything reaches storage
    account.validate()?;

    if let Some(file) = ctx.upload.take() {
        let avatar = save_upload(state.storage.as_ref(), &format!("avatars/{}", account.id), &file)
            .await
            .map_err(|e| {
                error!(error = %e, "avatar upload failed");
                e
            })?;
        account.avatar = Some(avatar);
    }

    let avatar = account.avatar.clone();
    let saved = match prepare_for_persistence(account) {
        Ok(prepared) => state.accounts.insert(&prepared).await,
        Err(e) => Err(e),
    };
    let account = match saved {
        Ok(a) => a,
        Err(e) => {
            warn!(error = %e, "registration rejected");
            remove_assets(state.storage.as_ref(), avatar.iter()).await;
            return Err(e);
        }
    };

    let token = state.keys.issue(&account)?;
    info!(account_id = %account.id, email = %account.email, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully",
            user: PublicUser::from(&account),
            token,
            expires_in: state.keys.ttl().as_secs(),
        }),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn login(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let payload: LoginRequest = ctx.payload().await?;
    let email = payload.email.trim().to_lowercase();

    let Some(account) = state.accounts.find_by_email_with_password(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::unauthorized("Invalid credentials"));
    };
    let hash = account
        .password
        .hash()
        .ok_or_else(|| anyhow::anyhow!("account {} has no password hash", account.id))?;
    if !verify_password(&payload.password, hash)? {
        warn!(%email, account_id = %account.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = state.keys.issue(&account)?;
    info!(account_id = %account.id, "account logged in");
    Ok(Json(AuthResponse {
        success: true,
        message: "User logged in successfully",
        user: PublicUser::from(&account),
        token,
        expires_in: state.keys.ttl().as_secs(),
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn me(state: AppState, ctx: RequestContext) -> AppResult<Response> {
    let id = ctx.identity()?.id;
    let account = state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(MeResponse {
        success: true,
        message: "User details",
        user: PublicUser::from(&account),
    })
    .into_response())
}

#[instrument(skip_all)]
pub async fn change_password(state: AppState, mut ctx: RequestContext) -> AppResult<Response> {
    let id = ctx.identity()?.id;
    let payload: ChangePasswordRequest = ctx.payload().await?;

    let email = state
        .accounts
        .find_by_id(id)
        .await?
        .map(|a| a.email)
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let mut account = state
        .accounts
        .find_by_email_with_password(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let hash = account
        .password
        .hash()
        .ok_or_else(|| anyhow::anyhow!("account {} has no password hash", account.id))?;
    if !verify_password(&payload.old_password, hash)? {
        warn!(account_id = %id, "change password with wrong old password");
        return Err(AppError::bad_request("Invalid old password"));
    }

    account.set_password(&payload.new_password);
    state.accounts.update(&prepare_for_persistence(account)?).await?;
    info!(account_id = %id, "password changed");
    Ok(Json(Ack {
        success: true,
        message: "Password changed successfully",
    })
    .into_response())
}
