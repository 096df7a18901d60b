//! Request-time half of [`AuthMiddleware`](super::AuthMiddleware).

use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse};
use actix_web::{web, Error, HttpMessage, ResponseError};
use futures_util::future::LocalBoxFuture;

use super::auth_middleware::CLIENT_ID_HEADER;
use crate::core::errors::{AppError, AppResult};
use crate::domain::models::auth::{AuthenticatedUser, ClientKind, ClientRegistry};
use crate::services::auth::{extract_bearer_token, TokenVerifier};

pub struct AuthMiddlewareService<S> {
    pub service: Rc<S>,
    pub allowed: Rc<Vec<ClientKind>>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, actix_web::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let allowed = self.allowed.clone();

        Box::pin(async move {
            match authenticate(&req, &allowed).await {
                Ok(user) => {
                    log::debug!("Authenticated {} via {} client", user.sub, user.client);
                    req.extensions_mut().insert(user);
                }
                Err(err) => {
                    log::warn!("Rejected {} {}: {}", req.method(), req.path(), err);
                    let response = err.error_response();
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

async fn authenticate(req: &ServiceRequest, allowed: &[ClientKind]) -> AppResult<AuthenticatedUser> {
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("TokenVerifier not registered".to_string()))?;
    let registry = req
        .app_data::<web::Data<ClientRegistry>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("ClientRegistry not registered".to_string()))?;

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing Authorization header".to_string()))?;
    let claims = verifier.verify(extract_bearer_token(auth_header)?).await?;

    let client_id = req
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthorizationError(format!("Missing {} header", CLIENT_ID_HEADER)))?;
    let client = registry
        .kind_of(client_id)
        .filter(|kind| allowed.contains(kind))
        .ok_or_else(|| AppError::AuthorizationError("Client not allowed on this route".to_string()))?;

    if claims.app_client() != Some(client_id) {
        return Err(AppError::AuthorizationError(
            "Token was issued to a different client".to_string(),
        ));
    }
    if !claims.groups.iter().any(|g| g == client.group().name()) {
        return Err(AppError::AuthorizationError(format!(
            "User is not a member of {}",
            client.group()
        )));
    }

    Ok(AuthenticatedUser {
        sub: claims.sub,
        email: claims.email,
        groups: claims.groups,
        client,
    })
}
