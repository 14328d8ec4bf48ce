use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{time, Key, SameSite};
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use charity_gallery::gallery::{GalleryService, OrmGalleryRepository, ValidationMode};
use charity_gallery::session::AdminSessions;
use charity_gallery::storage::{self, StorageBackend};
use charity_gallery::{app_config, db, rate_limit};
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    app_config::init();

    let config = app_config::get_config();
    rate_limit::init_rate_limits(&config.rate_limit);

    let db = db::init_db(&config.database.url)
        .await
        .context("failed to connect to the database")?;
    db::ensure_schema(&db)
        .await
        .context("failed to create the gallery table")?;

    let storage: Arc<dyn StorageBackend> =
        storage::from_config(&config.storage, &config.site.base_url)
            .context("failed to initialize storage")?;
    log::info!("Storage backend: {}", config.storage.backend);

    let mode = if config.uploads.enforce_dimensions {
        ValidationMode::Strict
    } else {
        ValidationMode::Standard
    };
    let gallery = Data::new(
        GalleryService::new(storage.clone(), Arc::new(OrmGalleryRepository::new(db)))
            .with_validation_mode(mode),
    );
    let sessions = Data::new(AdminSessions::from_config(&config.admin));
    let storage = Data::new(storage);

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) => match Key::try_from(key.as_bytes()) {
            Ok(key) => key,
            Err(err) => random_key(&format!("{:?}", err)),
        },
        Err(err) => random_key(&err.to_string()),
    };

    // Spawn rate limiter cleanup task
    actix_web::rt::spawn(async {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            rate_limit::cleanup_old_entries_public();
            log::debug!("Rate limiter cleanup completed");
        }
    });

    let session_ttl = time::Duration::minutes(config.admin.session_timeout_minutes.max(1) as i64);
    let secure_cookies = config.admin.secure_cookies;
    let bind = config.site.bind.clone();
    log::info!("{} gallery listening on {}", config.site.name, bind);

    HttpServer::new(move || {
        // Middleware is registered in reverse execution order.
        App::new()
            .app_data(gallery.clone())
            .app_data(sessions.clone())
            .app_data(storage.clone())
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add((
                        "Permissions-Policy",
                        "geolocation=(), microphone=(), camera=()",
                    )),
            )
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_name("gallery_admin".to_owned())
                    .cookie_same_site(SameSite::Strict)
                    .cookie_secure(secure_cookies)
                    .cookie_http_only(true)
                    .session_lifecycle(PersistentSession::default().session_ttl(session_ttl))
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %b %T"))
            .configure(charity_gallery::web::configure)
    })
    .bind(bind.as_str())
    .with_context(|| format!("failed to bind {}", bind))?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

fn random_key(reason: &str) -> Key {
    let random_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect();
    log::warn!(
        "SECRET_KEY was invalid. Reason: {}\r\nAdmin sessions will be invalidated every time the application is restarted. A secret key must be at least 64 bytes to be accepted.",
        reason
    );
    Key::from(random_string.as_bytes())
}
