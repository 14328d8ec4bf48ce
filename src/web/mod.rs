pub mod admin;
pub mod gallery;
pub mod media;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    admin::configure(conf);
    gallery::configure(conf);
    media::configure(conf);
}
