use std::str::FromStr;

use axum::{
    extract::{Json, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::authz::{authorize, ADMIN_ONLY};
use crate::models::organization::OrgRole;
use crate::responses::JsonResponse;
use crate::routes::auth::{issue_token_pair, session::AuthSession};
use crate::state::AppState;
use crate::tenancy::resolve_organization;
use crate::utils::password::{hash_password, random_unusable_password};
use crate::utils::reset_token::{encode_uid, generate_token};
use crate::utils::validate::is_valid_email;
use crate::worker::EmailJob;

#[derive(Deserialize)]
pub struct InvitePayload {
    pub email: String,
    /// Kept as a string so a bad value yields a field error, not a 422.
    pub role: String,
}

/// Invite a user into the caller's organization. Creates the account on
/// first contact with an unusable password and emails a password-set link;
/// re-inviting an existing member is a no-op that keeps their original role.
pub async fn handle_invite(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<InvitePayload>,
) -> Response {
    let auth = match session.auth_context() {
        Ok(auth) => auth,
        Err(status) => return status.into_response(),
    };

    let org = match resolve_organization(state.orgs.as_ref(), &headers, Some(&auth)).await {
        Ok(Some(org)) => org,
        Ok(None) => return JsonResponse::not_found("Organization not found").into_response(),
        Err(err) => {
            tracing::error!("invite: tenant resolution failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    match authorize(state.orgs.as_ref(), auth.user_id, org.id, ADMIN_ONLY).await {
        Ok(true) => {}
        Ok(false) => {
            return JsonResponse::forbidden("Only admins can invite members").into_response()
        }
        Err(err) => {
            tracing::error!("invite: role lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }

    let email = payload.email.trim().to_lowercase();
    let mut errors = Map::new();
    if !is_valid_email(&email) {
        errors.insert("email".into(), json!("Enter a valid email address"));
    }
    let role = match OrgRole::from_str(&payload.role) {
        Ok(role) => Some(role),
        Err(()) => {
            errors.insert(
                "role".into(),
                json!("Must be one of: admin, manager, employee"),
            );
            None
        }
    };
    if !errors.is_empty() {
        return JsonResponse::validation_error("Validation failed", Value::Object(errors))
            .into_response();
    }
    let role = role.unwrap_or(OrgRole::Employee);

    let placeholder_hash = match hash_password(&random_unusable_password()) {
        Ok(hash) => hash,
        Err(_) => return JsonResponse::server_error("Password hashing failed").into_response(),
    };

    let (user, _created) = match state
        .users
        .get_or_create_by_email(&email, &placeholder_hash)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("invite: get-or-create failed: {:?}", err);
            return JsonResponse::server_error("Could not create user").into_response();
        }
    };

    if let Err(err) = state.orgs.add_member(org.id, user.id, role).await {
        tracing::error!("invite: membership insert failed: {:?}", err);
        return JsonResponse::server_error("Could not create membership").into_response();
    }

    let expires_at =
        OffsetDateTime::now_utc() + Duration::hours(state.config.reset_token_ttl_hours);
    let token = generate_token(
        &state.config.reset_token_secret,
        user.id,
        &user.password_hash,
        expires_at,
    );
    let reset_url = state.config.reset_link(&encode_uid(user.id), &token);

    state.email_queue.enqueue(EmailJob {
        to: email.clone(),
        subject: format!("You've been invited to join {}", org.name),
        body: format!("Hello, please set your password here: {}", reset_url),
    });

    JsonResponse::created(&format!("{} invited as {} to {}", email, role, org.name))
        .into_response()
}

pub async fn handle_my_memberships(
    State(state): State<AppState>,
    session: AuthSession,
) -> Response {
    let user_id = match session.user_id() {
        Ok(id) => id,
        Err(status) => return status.into_response(),
    };

    match state.orgs.list_memberships_for_user(user_id).await {
        Ok(memberships) => {
            Json(json!({ "success": true, "memberships": memberships })).into_response()
        }
        Err(err) => {
            tracing::error!("memberships: lookup failed: {:?}", err);
            JsonResponse::server_error("Database error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct SwitchOrgPayload {
    pub org_id: Uuid,
}

/// Re-issue the token pair with a different active organization. Membership
/// is checked now and again whenever the tokens are refreshed.
pub async fn handle_switch_org(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<SwitchOrgPayload>,
) -> Response {
    let user_id = match session.user_id() {
        Ok(id) => id,
        Err(status) => return status.into_response(),
    };

    match state
        .orgs
        .find_membership(user_id, payload.org_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return JsonResponse::forbidden("Not a member of this organization").into_response()
        }
        Err(err) => {
            tracing::error!("switch-org: membership lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }

    let user = match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return JsonResponse::unauthorized("Unknown user").into_response(),
        Err(err) => {
            tracing::error!("switch-org: user lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    let (access_token, refresh_token) =
        match issue_token_pair(&user, Some(payload.org_id), &state) {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!("switch-org: token generation failed: {:?}", err);
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
