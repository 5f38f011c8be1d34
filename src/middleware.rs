//! Identity extraction and the redirect of anonymous visitors.

use std::future::{Future, Ready, ready};
use std::pin::Pin;

use actix_identity::IdentityExt;
use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::{StatusCode, header};
use actix_web::{Error, FromRequest, HttpRequest, HttpResponse, web};
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::domain::auth::AuthenticatedUser;
use crate::models::config::ServerConfig;

/// Sign-in page of the authentication service.
pub const SIGNIN_PATH: &str = "/auth/signin";

/// Decodes the JWT stored in the identity cookie.
pub fn decode_token(token: &str, secret: &str) -> Result<AuthenticatedUser, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<AuthenticatedUser>(token, &key, &Validation::default()).map(|data| data.claims)
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(config) = req.app_data::<web::Data<ServerConfig>>() else {
            log::error!("Server configuration is missing from the application data");
            return ready(Err(actix_web::error::ErrorInternalServerError(
                "missing configuration",
            )));
        };
        let token = match req.get_identity().and_then(|identity| identity.id()) {
            Ok(token) => token,
            Err(_) => return ready(Err(actix_web::error::ErrorUnauthorized("not signed in"))),
        };
        ready(decode_token(&token, &config.secret).map_err(|err| {
            log::warn!("Rejected identity token: {err}");
            actix_web::error::ErrorUnauthorized("invalid token")
        }))
    }
}

/// Turns `401 Unauthorized` responses into a redirect to the sign-in page.
pub struct RedirectUnauthorized;

impl<S, B> Transform<S, ServiceRequest> for RedirectUnauthorized
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RedirectUnauthorizedMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RedirectUnauthorizedMiddleware { service }))
    }
}

pub struct RedirectUnauthorizedMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RedirectUnauthorizedMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let response = self.service.call(req);
        Box::pin(async move {
            let response = response.await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response.map_into_left_body());
            }
            let (request, _) = response.into_parts();
            let redirect = HttpResponse::SeeOther()
                .insert_header((header::LOCATION, SIGNIN_PATH))
                .finish()
                .map_into_right_body();
            Ok(ServiceResponse::new(request, redirect))
        })
    }
}
