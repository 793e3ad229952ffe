use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::responses::JsonResponse;
use crate::routes::auth::{issue_token_pair, session::AuthSession};
use crate::state::AppState;
use crate::utils::password::verify_password;

#[derive(Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

pub async fn handle_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Response {
    let user = match state.users.find_user_by_username(&payload.username).await {
        Ok(Some(user)) => user,
        Ok(None) => return JsonResponse::unauthorized("Invalid credentials").into_response(),
        Err(err) => {
            tracing::error!("login: user lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            return JsonResponse::unauthorized("Invalid credentials").into_response()
        }
    }

    // Default the active organization to the earliest membership so tokens
    // behave deterministically for multi-org users.
    let org = match state.orgs.list_memberships_for_user(user.id).await {
        Ok(memberships) => memberships.first().map(|m| m.organization.id),
        Err(err) => {
            tracing::error!("login: membership lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    let (access_token, refresh_token) = match issue_token_pair(&user, org, &state) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!("login: token generation failed: {:?}", err);
            return JsonResponse::server_error("Token generation failed").into_response();
        }
    };

    Json(json!({
        "success": true,
        "access_token": access_token,
        "refresh_token": refresh_token,
    }))
    .into_response()
}

pub async fn handle_me(State(state): State<AppState>, session: AuthSession) -> Response {
    let user_id = match session.user_id() {
        Ok(id) => id,
        Err(status) => return status.into_response(),
    };

    match state.users.find_public_user_by_id(user_id).await {
        Ok(Some(user)) => Json(json!({ "success": true, "user": user })).into_response(),
        Ok(None) => JsonResponse::unauthorized("Unknown user").into_response(),
        Err(err) => {
            tracing::error!("me: user lookup failed: {:?}", err);
            JsonResponse::server_error("Database error").into_response()
        }
    }
}
