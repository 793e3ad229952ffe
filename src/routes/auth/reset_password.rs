use axum::{
    extract::{Json, Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::responses::JsonResponse;
use crate::state::AppState;
use crate::utils::password::hash_password;
use crate::utils::reset_token::{decode_uid, verify_token};
use crate::utils::validate::MIN_PASSWORD_LENGTH;

#[derive(Deserialize)]
pub struct ResetPasswordPayload {
    pub new_password: String,
}

/// Confirm a password-set link. The token is bound to the current password
/// hash, so a successful reset invalidates the link it arrived on.
pub async fn handle_reset_password(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Response {
    let Some(user_id) = decode_uid(&uid) else {
        return JsonResponse::bad_request("Invalid link").into_response();
    };

    let user = match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return JsonResponse::bad_request("Invalid link").into_response(),
        Err(err) => {
            tracing::error!("reset: user lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    let valid = verify_token(
        &state.config.reset_token_secret,
        user.id,
        &user.password_hash,
        &token,
        OffsetDateTime::now_utc(),
    );
    if !valid {
        return JsonResponse::bad_request("Invalid or expired token").into_response();
    }

    if payload.new_password.len() < MIN_PASSWORD_LENGTH {
        return JsonResponse::validation_error(
            "Validation failed",
            json!({
                "new_password": format!("Must be at least {} characters", MIN_PASSWORD_LENGTH)
            }),
        )
        .into_response();
    }

    let password_hash = match hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(_) => return JsonResponse::server_error("Password hashing failed").into_response(),
    };

    if let Err(err) = state.users.update_user_password(user.id, &password_hash).await {
        tracing::error!("reset: password update failed: {:?}", err);
        return JsonResponse::server_error("Database error").into_response();
    }

    JsonResponse::success("Password updated").into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use serde_json::json;
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::db::mock_db::test_user;
    use crate::state::test_support::{test_backend, TestBackend};
    use crate::utils::password::verify_password;
    use crate::utils::reset_token::{encode_uid, generate_token};

    use super::handle_reset_password;

    fn build_app(backend: &TestBackend) -> Router {
        Router::new()
            .route("/reset-password/{uid}/{token}", post(handle_reset_password))
            .with_state(backend.state.clone())
    }

    fn reset_request(uid: &str, token: &str, password: &str) -> Request<Body> {
        Request::post(format!("/reset-password/{}/{}", uid, token))
            .header("Content-Type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "new_password": password })).unwrap(),
            ))
            .unwrap()
    }

    fn valid_link(backend: &TestBackend, user: &crate::models::user::User) -> (String, String) {
        let token = generate_token(
            &backend.state.config.reset_token_secret,
            user.id,
            &user.password_hash,
            OffsetDateTime::now_utc() + Duration::hours(72),
        );
        (encode_uid(user.id), token)
    }

    #[tokio::test]
    async fn valid_link_sets_password() {
        let backend = test_backend();
        let user = test_user("invitee", "i@acme.com", "$argon2$unusable");
        backend.users.users.lock().unwrap().push(user.clone());
        let (uid, token) = valid_link(&backend, &user);

        let app = build_app(&backend);
        let res = app
            .oneshot(reset_request(&uid, &token, "fresh-password-1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let users = backend.users.users.lock().unwrap();
        assert!(verify_password("fresh-password-1", &users[0].password_hash).unwrap());
    }

    #[tokio::test]
    async fn link_is_single_use() {
        let backend = test_backend();
        let user = test_user("invitee", "i@acme.com", "$argon2$unusable");
        backend.users.users.lock().unwrap().push(user.clone());
        let (uid, token) = valid_link(&backend, &user);

        let app = build_app(&backend);
        let res = app
            .clone()
            .oneshot(reset_request(&uid, &token, "fresh-password-1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // Password hash changed, so the same token no longer verifies.
        let res = app
            .oneshot(reset_request(&uid, &token, "other-password-2"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn garbage_uid_is_400() {
        let backend = test_backend();
        let app = build_app(&backend);
        let res = app
            .oneshot(reset_request("not-base64!!", "whatever", "fresh-password-1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_user_is_400() {
        let backend = test_backend();
        let app = build_app(&backend);
        let res = app
            .oneshot(reset_request(
                &encode_uid(Uuid::new_v4()),
                "deadbeef-00",
                "fresh-password-1",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn short_password_is_rejected_without_burning_token() {
        let backend = test_backend();
        let user = test_user("invitee", "i@acme.com", "$argon2$unusable");
        backend.users.users.lock().unwrap().push(user.clone());
        let (uid, token) = valid_link(&backend, &user);

        let app = build_app(&backend);
        let res = app
            .clone()
            .oneshot(reset_request(&uid, &token, "short"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // Token still works afterwards.
        let res = app
            .oneshot(reset_request(&uid, &token, "fresh-password-1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
