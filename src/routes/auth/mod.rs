pub mod claims;
pub mod login;
pub mod refresh;
pub mod reset_password;
pub mod session;
pub mod signup;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::user::User;
use crate::state::AppState;
use crate::utils::jwt::create_jwt;

use claims::{Claims, TokenUse};

pub use login::{handle_login, handle_me};
pub use refresh::handle_refresh;
pub use reset_password::handle_reset_password;
pub use signup::handle_signup;

const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Access + refresh token pair for a user, both carrying the same active
/// organization claim.
pub fn issue_token_pair(
    user: &User,
    org: Option<Uuid>,
    state: &AppState,
) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let base = Claims {
        id: user.id.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        org,
        exp: 0,
        iss: String::new(),
        aud: String::new(),
        token_use: TokenUse::Access,
    };

    let access = Claims {
        exp: (now + ACCESS_TOKEN_TTL_SECS) as usize,
        ..base.clone()
    };
    let refresh = Claims {
        exp: (now + REFRESH_TOKEN_TTL_SECS) as usize,
        token_use: TokenUse::Refresh,
        ..base
    };

    let issuer = &state.config.jwt_issuer;
    let audience = &state.config.jwt_audience;
    Ok((
        create_jwt(access, &state.jwt, issuer, audience)?,
        create_jwt(refresh, &state.jwt, issuer, audience)?,
    ))
}
