use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::TypedHeaderRejection;

use crate::auth::AppState;
use crate::error::ApiError;

/// Resolve the bearer token to an active user and attach its `Identity` to
/// the request. Same checks as the WebSocket upgrade. A missing or
/// non-Bearer `Authorization` header counts as no credential.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer.as_ref().ok().map(|TypedHeader(auth)| auth.token());

    match state.authenticator.authenticate(token).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    use studyhall_types::models::Role;

    use crate::test_support::{bearer_request, read_json, seed_user, test_app};

    #[tokio::test]
    async fn non_bearer_authorization_is_an_authentication_error() {
        let (state, app) = test_app();
        seed_user(&state, "ana", 3, Role::Student);

        for value in ["Basic Zm9vOmJhcg==", "Bearer", "garbage"] {
            let req = Request::builder()
                .method(Method::GET)
                .uri("/notifications")
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", value);
            assert_eq!(read_json(res).await["error"], "authentication error");
        }
    }

    #[tokio::test]
    async fn valid_bearer_reaches_the_handler() {
        let (state, app) = test_app();
        let ana = seed_user(&state, "ana", 3, Role::Student);

        let res = app
            .oneshot(bearer_request(Method::GET, "/notifications/unread-count", Some(&ana.token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
