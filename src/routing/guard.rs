use async_trait::async_trait;

use super::context::RequestContext;
use crate::{error::AppResult, state::AppState};

/// A check that runs before a route's handler.
///
/// Returning `Err` short-circuits the request: no later guard and no handler
/// runs, and the error becomes the response.
#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, state: &AppState, ctx: &mut RequestContext) -> AppResult<()>;
}
