use crate::gallery::GalleryError;
use crate::middleware::csrf::{requires_csrf, validate_csrf_header};
use crate::session::{AdminSession, AdminSessions};
use actix_session::SessionExt;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web::Data, Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use uuid::Uuid;

/// Cookie session key holding the admin session token.
pub const ADMIN_TOKEN_SESSION_KEY: &str = "admin_token";

/// Proof that the request comes from an authenticated administrator.
///
/// Resolved per request from either an `Authorization: Bearer <token>` header
/// or the cookie session. Cookie-authenticated state changes must also carry
/// the session's CSRF token. Any failure is a 401 with the same body, so a
/// caller cannot tell a bad token from a missing one.
#[derive(Clone, Debug)]
pub struct AdminCtx {
    session: AdminSession,
}

impl AdminCtx {
    pub fn token(&self) -> Uuid {
        self.session.token
    }

    pub fn csrf_token(&self) -> &str {
        &self.session.csrf_token
    }

    pub fn authenticate(req: &HttpRequest) -> Result<Self, GalleryError> {
        let sessions = req.app_data::<Data<AdminSessions>>().ok_or_else(|| {
            log::error!("AdminCtx: AdminSessions is not registered as app data");
            GalleryError::Unauthorized
        })?;

        if let Some(token) = bearer_token(req) {
            return sessions
                .authenticate(&token)
                .map(|session| AdminCtx { session })
                .ok_or(GalleryError::Unauthorized);
        }

        let token = req
            .get_session()
            .get::<String>(ADMIN_TOKEN_SESSION_KEY)
            .ok()
            .flatten()
            .and_then(|t| Uuid::parse_str(&t).ok())
            .ok_or(GalleryError::Unauthorized)?;

        let session = sessions
            .authenticate(&token)
            .ok_or(GalleryError::Unauthorized)?;

        if requires_csrf(req.method()) && !validate_csrf_header(req, &session.csrf_token) {
            return Err(GalleryError::Unauthorized);
        }

        Ok(AdminCtx { session })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<Uuid> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Uuid::parse_str(token.trim()).ok()
}

impl FromRequest for AdminCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(AdminCtx::authenticate(req).map_err(Error::from))
    }
}
