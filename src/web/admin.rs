use crate::gallery::GalleryError;
use crate::ip::extract_client_ip;
use crate::middleware::admin_ctx::ADMIN_TOKEN_SESSION_KEY;
use crate::middleware::AdminCtx;
use crate::rate_limit::{check_login_rate_limit, clear_login_attempts};
use crate::session::AdminSessions;
use actix_session::Session;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(login).service(logout).service(session_status);
}

#[derive(Deserialize)]
pub struct LoginForm {
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    success: bool,
    token: String,
    csrf_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatus {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    csrf_token: Option<String>,
}

#[post("/api/admin/login")]
async fn login(
    req: HttpRequest,
    cookies: Session,
    sessions: web::Data<AdminSessions>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, GalleryError> {
    let ip = extract_client_ip(&req).unwrap_or_else(|| "unknown".to_owned());

    if let Err(e) = check_login_rate_limit(&ip) {
        log::warn!("Admin login rate limited for {}", ip);
        return Err(GalleryError::RateLimited {
            retry_after_seconds: e.retry_after_seconds,
        });
    }

    // Argon2 verification blocks; run it on the blocking pool.
    let password = form.into_inner().password;
    let verifier = sessions.clone();
    let session = web::block(move || verifier.login(&password))
        .await
        .map_err(|e| GalleryError::Internal(format!("login verification task failed: {}", e)))?;

    let session = match session {
        Some(session) => session,
        None => {
            log::info!("Failed admin login from {}", ip);
            return Err(GalleryError::Unauthorized);
        }
    };

    clear_login_attempts(&ip);

    cookies.renew();
    cookies
        .insert(ADMIN_TOKEN_SESSION_KEY, session.token.to_string())
        .map_err(|e| {
            sessions.remove_session(&session.token);
            GalleryError::Internal(format!("failed to store admin session: {}", e))
        })?;

    log::info!("Admin logged in from {}", ip);

    Ok(HttpResponse::Ok().json(LoginResponse {
        success: true,
        token: session.token.to_string(),
        csrf_token: session.csrf_token,
    }))
}

#[post("/api/admin/logout")]
async fn logout(
    admin: Option<AdminCtx>,
    cookies: Session,
    sessions: web::Data<AdminSessions>,
) -> HttpResponse {
    if let Some(admin) = admin {
        sessions.remove_session(&admin.token());
        log::info!("Admin session {} closed", admin.token());
    }
    // A cookie session without a CSRF header still gets torn down.
    if let Ok(Some(token)) = cookies.get::<String>(ADMIN_TOKEN_SESSION_KEY) {
        if let Ok(token) = Uuid::parse_str(&token) {
            sessions.remove_session(&token);
        }
    }
    cookies.purge();

    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}

#[get("/api/admin/session")]
async fn session_status(admin: Option<AdminCtx>) -> HttpResponse {
    HttpResponse::Ok().json(SessionStatus {
        authenticated: admin.is_some(),
        csrf_token: admin.map(|a| a.csrf_token().to_owned()),
    })
}
