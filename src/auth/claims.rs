use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::Role;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // login email at time of issue
    pub role: Role,    // authorization tier at time of issue
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
    pub iss: String,   // issuer
    pub aud: String,   // audience
}
