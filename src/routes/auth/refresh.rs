use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::routes::auth::{claims::TokenUse, issue_token_pair};
use crate::state::AppState;
use crate::utils::jwt::decode_jwt;

#[derive(Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

/// Exchange a refresh token for a fresh pair. The active organization claim
/// is revalidated against current memberships so a token cannot keep an org
/// alive after the user was removed from it.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Response {
    let data = match decode_jwt(
        &payload.refresh_token,
        &state.jwt,
        &state.config.jwt_issuer,
        &state.config.jwt_audience,
    ) {
        Ok(data) => data,
        Err(_) => return JsonResponse::unauthorized("Invalid refresh token").into_response(),
    };

    if data.claims.token_use != TokenUse::Refresh {
        return JsonResponse::unauthorized("Invalid refresh token").into_response();
    }

    let user_id = match Uuid::parse_str(&data.claims.id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::unauthorized("Invalid refresh token").into_response(),
    };

    let user = match state.users.find_user_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return JsonResponse::unauthorized("Unknown user").into_response(),
        Err(err) => {
            tracing::error!("refresh: user lookup failed: {:?}", err);
            return JsonResponse::server_error("Database error").into_response();
        }
    };

    let org = match data.claims.org {
        Some(org_id) => match state.orgs.find_membership(user.id, org_id).await {
            Ok(Some(_)) => Some(org_id),
            Ok(None) => match state.orgs.list_memberships_for_user(user.id).await {
                Ok(memberships) => memberships.first().map(|m| m.organization.id),
                Err(err) => {
                    tracing::error!("refresh: membership lookup failed: {:?}", err);
                    return JsonResponse::server_error("Database error").into_response();
                }
            },
            Err(err) => {
                tracing::error!("refresh: membership lookup failed: {:?}", err);
                return JsonResponse::server_error("Database error").into_response();
            }
        },
        None => None,
    };

    let (access_token, refresh_token) = match issue_token_pair(&user, org, &state) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!("refresh: token generation failed: {:?}", err);
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

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::mock_db::{test_org, test_user};
    use crate::models::organization::OrgRole;
    use crate::routes::auth::issue_token_pair;
    use crate::state::test_support::{test_backend, TestBackend};
    use crate::utils::jwt::decode_jwt;

    use super::handle_refresh;

    fn build_app(backend: &TestBackend) -> Router {
        Router::new()
            .route("/refresh", post(handle_refresh))
            .with_state(backend.state.clone())
    }

    fn refresh_request(token: &str) -> Request<Body> {
        Request::post("/refresh")
            .header("Content-Type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "refresh_token": token })).unwrap(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn refresh_reissues_pair_for_valid_token() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        backend.users.users.lock().unwrap().push(user.clone());
        let org = test_org("Acme", "acme");
        backend.orgs.orgs.lock().unwrap().push(org.clone());
        backend.orgs.insert_membership(user.id, org.id, OrgRole::Admin);

        let (_, refresh) = issue_token_pair(&user, Some(org.id), &backend.state).unwrap();
        let app = build_app(&backend);
        let res = app.oneshot(refresh_request(&refresh)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let data = decode_jwt(
            json["access_token"].as_str().unwrap(),
            &backend.state.jwt,
            &backend.state.config.jwt_issuer,
            &backend.state.config.jwt_audience,
        )
        .unwrap();
        assert_eq!(data.claims.org, Some(org.id));
    }

    #[tokio::test]
    async fn access_token_is_not_accepted_as_refresh() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        backend.users.users.lock().unwrap().push(user.clone());

        let (access, _) = issue_token_pair(&user, None, &backend.state).unwrap();
        let app = build_app(&backend);
        let res = app.oneshot(refresh_request(&access)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stale_org_claim_falls_back_to_remaining_membership() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        backend.users.users.lock().unwrap().push(user.clone());
        let kept = test_org("Kept", "kept");
        let gone = test_org("Gone", "gone");
        backend
            .orgs
            .orgs
            .lock()
            .unwrap()
            .extend([kept.clone(), gone.clone()]);
        backend
            .orgs
            .insert_membership(user.id, kept.id, OrgRole::Employee);

        // Refresh token still claims the org the user was removed from.
        let (_, refresh) = issue_token_pair(&user, Some(gone.id), &backend.state).unwrap();
        let app = build_app(&backend);
        let res = app.oneshot(refresh_request(&refresh)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let data = decode_jwt(
            json["access_token"].as_str().unwrap(),
            &backend.state.jwt,
            &backend.state.config.jwt_issuer,
            &backend.state.config.jwt_audience,
        )
        .unwrap();
        assert_eq!(data.claims.org, Some(kept.id));
    }

    #[tokio::test]
    async fn deleted_user_is_401() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        let (_, refresh) = issue_token_pair(&user, None, &backend.state).unwrap();

        let app = build_app(&backend);
        let res = app.oneshot(refresh_request(&refresh)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
