use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::model::{Role, Subscription};

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,                          // account ID
    pub role: Role,
    pub subscription: Option<Subscription>, // snapshot at issue time
    pub iat: usize,                         // issued at (unix timestamp)
    pub exp: usize,                         // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// Caller identity attached to a request by the authentication guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub subscription: Option<Subscription>,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            id: c.sub,
            role: c.role,
            subscription: c.subscription,
        }
    }
}
