use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::routes::auth::claims::{Claims, TokenUse};
use crate::state::AppState;
use crate::tenancy::AuthContext;
use crate::utils::jwt::decode_jwt;

/// Bearer-token extractor. Rejects refresh tokens on regular endpoints.
#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl AuthSession {
    pub fn user_id(&self) -> Result<Uuid, StatusCode> {
        Uuid::parse_str(&self.0.id).map_err(|_| StatusCode::UNAUTHORIZED)
    }

    pub fn auth_context(&self) -> Result<AuthContext, StatusCode> {
        Ok(AuthContext {
            user_id: self.user_id()?,
            active_org: self.0.org,
        })
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let data = decode_jwt(
            bearer.token(),
            &state.jwt,
            &state.config.jwt_issuer,
            &state.config.jwt_audience,
        )
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

        if data.claims.token_use != TokenUse::Access {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthSession(data.claims))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::FromRequestParts,
        http::{header, Method, Request, StatusCode},
    };
    use time::OffsetDateTime;

    use crate::db::mock_db::test_user;
    use crate::routes::auth::issue_token_pair;
    use crate::routes::auth::session::AuthSession;
    use crate::state::test_support::test_backend;

    #[tokio::test]
    async fn valid_access_token_extracted() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        let (access, _) = issue_token_pair(&user, None, &backend.state).unwrap();

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", access))
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let session = AuthSession::from_request_parts(&mut parts, &backend.state)
            .await
            .unwrap();
        assert_eq!(session.0.email, "a@acme.com");
        assert_eq!(session.user_id().unwrap(), user.id);
    }

    #[tokio::test]
    async fn refresh_token_is_rejected_on_regular_endpoints() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");
        let (_, refresh) = issue_token_pair(&user, None, &backend.state).unwrap();

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", refresh))
            .body(())
            .unwrap();

        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &backend.state).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn missing_and_garbage_tokens_are_unauthorized() {
        let backend = test_backend();

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(())
            .unwrap();
        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &backend.state).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer invalid.token.here")
            .body(())
            .unwrap();
        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &backend.state).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let backend = test_backend();
        let user = test_user("admin", "a@acme.com", "hash");

        // Hand-roll an already-expired access token.
        let claims = crate::routes::auth::claims::Claims {
            id: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            org: None,
            exp: (OffsetDateTime::now_utc().unix_timestamp() - 120) as usize,
            iss: String::new(),
            aud: String::new(),
            token_use: crate::routes::auth::claims::TokenUse::Access,
        };
        let token = crate::utils::jwt::create_jwt(
            claims,
            &backend.state.jwt,
            &backend.state.config.jwt_issuer,
            &backend.state.config.jwt_audience,
        )
        .unwrap();

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(())
            .unwrap();
        let mut parts = request.into_parts().0;
        let result = AuthSession::from_request_parts(&mut parts, &backend.state).await;
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }
}
