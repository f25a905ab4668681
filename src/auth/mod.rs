//! Session-cookie authentication (spec.md §6 "Authentication", SPEC_FULL.md
//! §2 "Session auth"). Grounded on two Nova sources adapted to a cookie
//! carrier instead of an `Authorization` header:
//!
//! - `identity-service/src/security/password.rs` for Argon2id hash/verify.
//! - `libs/actix-middleware/src/jwt_auth.rs` for the `Transform`/`Service`
//!   middleware shape and the `UserId` request-extension pattern.
//!
//! Nova's shared `crypto-core::jwt` mandates RS256 specifically to dodge
//! algorithm-confusion attacks across service boundaries. driftfeed is a
//! single process signing and verifying its own cookies, so there is no
//! cross-service boundary to protect against; HS256 over `SESSION_SECRET`
//! is the idiomatic choice here (documented as an Open Question resolution
//! in DESIGN.md) and keeps the single required secret spec.md §6 names.

pub mod password;

use std::future::{ready, Ready};
use std::pin::Pin;
use std::rc::Rc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// The authenticated caller, extracted from the session cookie and placed
/// into request extensions by `SessionAuth` (mirrors `UserId` in
/// `libs/actix-middleware/src/jwt_auth.rs`).
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

fn issue_token(cfg: &SessionConfig, user_id: &str, email: &str, now: chrono::DateTime<Utc>) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = SessionClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(cfg.expiry_days)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(cfg.secret.as_bytes()))
}

fn verify_token(cfg: &SessionConfig, token: &str) -> Option<CurrentUser> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    Some(CurrentUser {
        id: data.claims.sub,
        email: data.claims.email,
    })
}

/// Builds the `Set-Cookie` response cookie for a freshly authenticated user
/// (spec.md §6: fixed name, `HttpOnly`, `SameSite=Lax`, `Secure` in
/// production, 30-day expiry).
pub fn build_session_cookie<'a>(
    cfg: &SessionConfig,
    user_id: &str,
    email: &str,
    secure: bool,
) -> Result<Cookie<'a>, jsonwebtoken::errors::Error> {
    let token = issue_token(cfg, user_id, email, Utc::now())?;
    Ok(Cookie::build(cfg.cookie_name.clone(), token)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::days(cfg.expiry_days))
        .path("/")
        .finish())
}

/// The logout cookie: same name, empty value, immediately expired.
pub fn build_logout_cookie<'a>(cfg: &SessionConfig, secure: bool) -> Cookie<'a> {
    Cookie::build(cfg.cookie_name.clone(), "")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::seconds(0))
        .path("/")
        .finish()
}

/// Middleware that resolves the session cookie into a `CurrentUser` and
/// stores it in request extensions; does not itself reject unauthenticated
/// requests (spec.md §6 distinguishes API 401 vs page-redirect, which the
/// HTTP layer is better placed to decide), so handlers use the `CurrentUser`
/// extractor to enforce auth where required.
pub struct SessionAuth {
    pub config: SessionConfig,
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthService {
            service: Rc::new(service),
            config: self.config.clone(),
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    config: SessionConfig,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();

        Box::pin(async move {
            if let Some(cookie) = req.cookie(&config.cookie_name) {
                if let Some(user) = verify_token(&config, cookie.value()) {
                    req.extensions_mut().insert(user);
                }
            }
            service.call(req).await
        })
    }
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let user = req.extensions().get::<CurrentUser>().cloned();
        ready(user.ok_or_else(|| crate::error::AppError::AuthRequired.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SessionConfig {
        SessionConfig {
            secret: "test-secret-at-least-32-bytes-long!".to_string(),
            cookie_name: "driftfeed_session".to_string(),
            expiry_days: 30,
        }
    }

    #[test]
    fn issues_and_verifies_a_round_trip_token() {
        let cfg = cfg();
        let token = issue_token(&cfg, "u123", "a@b.com", Utc::now()).unwrap();
        let user = verify_token(&cfg, &token).unwrap();
        assert_eq!(user.id, "u123");
        assert_eq!(user.email, "a@b.com");
    }

    #[test]
    fn rejects_token_signed_with_a_different_secret() {
        let cfg_a = cfg();
        let mut cfg_b = cfg();
        cfg_b.secret = "a-totally-different-secret-value!!".to_string();
        let token = issue_token(&cfg_a, "u123", "a@b.com", Utc::now()).unwrap();
        assert!(verify_token(&cfg_b, &token).is_none());
    }

    #[test]
    fn rejects_an_expired_token() {
        let cfg = cfg();
        let token = issue_token(&cfg, "u123", "a@b.com", Utc::now() - Duration::days(31)).unwrap();
        assert!(verify_token(&cfg, &token).is_none());
    }
}
