//! Route-scope guard.
//!
//! ```rust,ignore
//! web::scope("/patients")
//!     .wrap(AuthMiddleware::for_clients(&[ClientKind::Marketplace]))
//!     .route("", web::get().to(list_patients))
//! ```
//!
//! Requests must carry a valid Cognito bearer token and an `x-client-id`
//! header naming one of the allowed client applications. The token must
//! have been issued to that same client and its user must belong to the
//! client's group. On success an [`AuthenticatedUser`] is placed in the
//! request extensions.
//!
//! [`AuthenticatedUser`]: crate::domain::models::auth::AuthenticatedUser

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, Result,
};

use crate::domain::models::auth::ClientKind;
use crate::middlewares::auth_inner::AuthMiddlewareService;

/// Header carrying the Cognito app client id of the calling frontend.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

pub struct AuthMiddleware {
    allowed: Rc<Vec<ClientKind>>,
}

impl AuthMiddleware {
    pub fn for_clients(allowed: &[ClientKind]) -> Self {
        Self {
            allowed: Rc::new(allowed.to_vec()),
        }
    }

    pub fn admin() -> Self {
        Self::for_clients(&[ClientKind::Admin])
    }

    pub fn business() -> Self {
        Self::for_clients(&[ClientKind::Business])
    }

    pub fn marketplace() -> Self {
        Self::for_clients(&[ClientKind::Marketplace])
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::auth::{AuthenticatedUser, ClientRegistry};
    use crate::services::auth::{CognitoClaims, TokenVerifier};
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"middleware-secret";
    const ISSUER: &str = "https://issuer.test";

    fn token(client_id: &str, groups: &[&str]) -> String {
        let claims = CognitoClaims {
            sub: "sub-42".to_string(),
            iss: ISSUER.to_string(),
            exp: chrono::Utc::now().timestamp() + 600,
            email: Some("ana@example.pt".to_string()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            client_id: Some(client_id.to_string()),
            aud: None,
            token_use: Some("access".to_string()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", user.sub, user.client))
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(TokenVerifier::with_secret(SECRET, ISSUER)))
                    .app_data(web::Data::new(
                        ClientRegistry::new()
                            .with_client("shop-app", ClientKind::Marketplace)
                            .with_client("biz-app", ClientKind::Business),
                    ))
                    .service(
                        web::scope("/patients")
                            .wrap(AuthMiddleware::marketplace())
                            .route("", web::get().to(whoami)),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_accepts_matching_client_and_group() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/patients")
            .insert_header(("Authorization", format!("Bearer {}", token("shop-app", &["customers"]))))
            .insert_header((CLIENT_ID_HEADER, "shop-app"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "sub-42:marketplace");
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/patients")
            .insert_header((CLIENT_ID_HEADER, "shop-app"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["statusCode"], 401);
    }

    #[actix_web::test]
    async fn test_client_not_allowed_on_scope_is_forbidden() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/patients")
            .insert_header(("Authorization", format!("Bearer {}", token("biz-app", &["business"]))))
            .insert_header((CLIENT_ID_HEADER, "biz-app"))
            .to_request();

        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_token_issued_to_other_client_is_forbidden() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/patients")
            .insert_header(("Authorization", format!("Bearer {}", token("biz-app", &["customers"]))))
            .insert_header((CLIENT_ID_HEADER, "shop-app"))
            .to_request();

        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_user_outside_client_group_is_forbidden() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/patients")
            .insert_header(("Authorization", format!("Bearer {}", token("shop-app", &["business"]))))
            .insert_header((CLIENT_ID_HEADER, "shop-app"))
            .to_request();

        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
