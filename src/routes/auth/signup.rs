use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};

use crate::db::violated_constraint;
use crate::models::organization::{Organization, OrgRole};
use crate::models::signup::SignupPayload;
use crate::models::user::PublicUser;
use crate::responses::JsonResponse;
use crate::routes::auth::issue_token_pair;
use crate::state::AppState;
use crate::utils::password::hash_password;
use crate::utils::slug::{is_valid_slug, slug_candidate, slugify};
use crate::utils::validate::{is_valid_email, MIN_PASSWORD_LENGTH};

const MAX_SLUG_ATTEMPTS: u32 = 50;
const SLUG_CONSTRAINT: &str = "organizations_slug_key";
const NAME_CONSTRAINT: &str = "organizations_name_key";

fn validate_payload(payload: &SignupPayload) -> Map<String, Value> {
    let mut errors = Map::new();

    if payload.org_name.trim().is_empty() {
        errors.insert("org_name".into(), json!("This field is required"));
    } else if payload.org_name.len() > 150 {
        errors.insert("org_name".into(), json!("Must be 150 characters or fewer"));
    }
    if let Some(slug) = payload.org_slug.as_deref() {
        if !is_valid_slug(slug) {
            errors.insert(
                "org_slug".into(),
                json!("Must contain only lowercase letters, digits and hyphens"),
            );
        }
    }
    if !is_valid_email(&payload.email) {
        errors.insert("email".into(), json!("Enter a valid email address"));
    }
    if payload.username.trim().is_empty() {
        errors.insert("username".into(), json!("This field is required"));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".into(),
            json!(format!(
                "Must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )),
        );
    }

    errors
}

/// Create an organization together with its founding admin user. When no slug
/// is supplied one is derived from the name; collisions retry with `-1`,
/// `-2`, ... suffixes against the store's unique constraint rather than a
/// pre-check, so concurrent signups cannot race into a duplicate.
async fn create_org_with_unique_slug(
    state: &AppState,
    name: &str,
    explicit_slug: Option<&str>,
) -> Result<Result<Organization, Response>, sqlx::Error> {
    if let Some(slug) = explicit_slug {
        return match state.orgs.create_organization(name, slug).await {
            Ok(org) => Ok(Ok(org)),
            Err(err) => match violated_constraint(&err) {
                Some(SLUG_CONSTRAINT) => Ok(Err(
                    JsonResponse::conflict("Organization slug already in use").into_response()
                )),
                Some(NAME_CONSTRAINT) => Ok(Err(JsonResponse::conflict(
                    "Organization name already registered",
                )
                .into_response())),
                _ => Err(err),
            },
        };
    }

    let base = slugify(name);
    if base.is_empty() {
        return Ok(Err(JsonResponse::validation_error(
            "Validation failed",
            json!({ "org_name": "Cannot derive a slug from this name" }),
        )
        .into_response()));
    }

    for attempt in 0..MAX_SLUG_ATTEMPTS {
        let candidate = slug_candidate(&base, attempt);
        match state.orgs.create_organization(name, &candidate).await {
            Ok(org) => return Ok(Ok(org)),
            Err(err) => match violated_constraint(&err) {
                Some(SLUG_CONSTRAINT) => continue,
                Some(NAME_CONSTRAINT) => {
                    return Ok(Err(JsonResponse::conflict(
                        "Organization name already registered",
                    )
                    .into_response()))
                }
                _ => return Err(err),
            },
        }
    }

    Ok(Err(
        JsonResponse::conflict("Could not find a free slug for this organization").into_response(),
    ))
}

pub async fn handle_signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Response {
    let mut payload = payload;
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    payload.org_name = payload.org_name.trim().to_string();

    let errors = validate_payload(&payload);
    if !errors.is_empty() {
        return JsonResponse::validation_error("Validation failed", Value::Object(errors))
            .into_response();
    }

    match state.users.is_username_taken(&payload.username).await {
        Ok(true) => return JsonResponse::conflict("Username already registered").into_response(),
        Ok(false) => {}
        Err(err) => {
            tracing::error!("signup: username lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }
    match state.users.is_email_taken(&payload.email).await {
        Ok(true) => return JsonResponse::conflict("Email already registered").into_response(),
        Ok(false) => {}
        Err(err) => {
            tracing::error!("signup: email lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(_) => return JsonResponse::server_error("Password hashing failed").into_response(),
    };

    let org = match create_org_with_unique_slug(
        &state,
        &payload.org_name,
        payload.org_slug.as_deref(),
    )
    .await
    {
        Ok(Ok(org)) => org,
        Ok(Err(response)) => return response,
        Err(err) => {
            tracing::error!("signup: failed to create organization: {:?}", err);
            return JsonResponse::server_error("Could not create organization").into_response();
        }
    };

    let user = match state
        .users
        .create_user(&payload.username, &payload.email, &password_hash)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            tracing::error!("signup: failed to create user: {:?}", err);
            let _ = state.orgs.delete_organization(org.id).await;
            return JsonResponse::server_error("Could not create user").into_response();
        }
    };

    if let Err(err) = state.orgs.add_member(org.id, user.id, OrgRole::Admin).await {
        tracing::error!("signup: failed to attach admin membership: {:?}", err);
        let _ = state.orgs.delete_organization(org.id).await;
        return JsonResponse::server_error("Could not create membership").into_response();
    }

    let (access_token, refresh_token) = match issue_token_pair(&user, Some(org.id), &state) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!("signup: token generation failed: {:?}", err);
            return JsonResponse::server_error("Token generation failed").into_response();
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": PublicUser::from(&user),
            "organization": org,
            "access_token": access_token,
            "refresh_token": refresh_token,
        })),
    )
        .into_response()
}
