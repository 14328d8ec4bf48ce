mod common;

use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use charity_gallery::gallery::GalleryService;
use charity_gallery::storage::local::LocalStorage;
use common::doubles::MemoryRepository;
use common::fixtures::{jpeg_of_size, multipart_body, png_bytes, upload_form, FormPart, TestContext};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[actix_rt::test]
async fn test_upload_without_credentials_is_denied() {
    let (ctx, storage, _records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) = upload_form("a.png", "image/png", &png_bytes(400, 400), "A", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Access denied");
    assert_eq!(storage.len(), 0);
}

#[actix_rt::test]
async fn test_upload_with_unknown_token_is_denied() {
    let (ctx, _storage, _records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) = upload_form("a.png", "image/png", &png_bytes(400, 400), "A", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", Uuid::new_v4())))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Access denied");
}

#[actix_rt::test]
async fn test_oversize_upload_returns_400() {
    let (ctx, storage, records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) =
        upload_form("big.jpg", "image/jpeg", &jpeg_of_size(600 * 1024), "Big", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, ctx.bearer()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("500 KB"), "message was: {}", message);
    assert!(message.contains("600.00 KB"), "message was: {}", message);
    assert_eq!(storage.len(), 0);
    assert_eq!(records.len(), 0);
}

#[actix_rt::test]
async fn test_wrong_type_returns_400() {
    let (ctx, _storage, _records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) = upload_form("logo.svg", "image/svg+xml", b"<svg/>", "Logo", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, ctx.bearer()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "Invalid file type. Accepted: image/jpeg, image/png, image/webp, image/gif"
    );
}

#[actix_rt::test]
async fn test_missing_file_returns_400() {
    let (ctx, _storage, _records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) = multipart_body(&[FormPart::Text("title", "Only a title")]);
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, ctx.bearer()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No file provided");
}

#[actix_rt::test]
async fn test_upload_then_fetch_image_url() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        LocalStorage::new(dir.path().to_path_buf(), "http://localhost/uploads".to_owned())
            .unwrap(),
    );
    let records = Arc::new(MemoryRepository::new());
    let ctx = TestContext::new(storage.clone(), GalleryService::new(storage, records.clone()));
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let image = png_bytes(400, 400);
    let (content_type, body) =
        upload_form("Spring Fair.png", "image/png", &image, "Test", "At the harbour");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, ctx.bearer()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    let image_url = body["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("http://localhost/uploads/"));
    assert!(image_url.ends_with("_Spring-Fair.png"));
    assert_eq!(records.get(id).unwrap().subtitle.as_deref(), Some("At the harbour"));

    let path = url::Url::parse(image_url).unwrap().path().to_owned();
    let req = test::TestRequest::get().uri(&path).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    let served = test::read_body(resp).await;
    assert_eq!(served.as_ref(), image.as_slice());

    // Partial fetch of the same object.
    let req = test::TestRequest::get()
        .uri(&path)
        .insert_header((header::RANGE, "bytes=0-7"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    let served = test::read_body(resp).await;
    assert_eq!(served.as_ref(), &image[..8]);
}

#[actix_rt::test]
async fn test_unknown_upload_key_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        LocalStorage::new(dir.path().to_path_buf(), "http://localhost/uploads".to_owned())
            .unwrap(),
    );
    let ctx = TestContext::new(
        storage.clone(),
        GalleryService::new(storage, Arc::new(MemoryRepository::new())),
    );
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/uploads/0123456789_missing.png")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_listing_returns_public_fields_newest_first() {
    let (ctx, _storage, _records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let bearer = ctx.bearer();

    for (title, subtitle) in [("Older", "first"), ("Newer", "")] {
        let (content_type, body) =
            upload_form("photo.png", "image/png", &png_bytes(400, 400), title, subtitle);
        let req = test::TestRequest::post()
            .uri("/api/upload-gallery")
            .insert_header((header::CONTENT_TYPE, content_type))
            .insert_header((header::AUTHORIZATION, bearer.clone()))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/api/gallery").to_request();
    let items: Value = test::call_and_read_body_json(&app, req).await;
    let items = items.as_array().unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Newer");
    assert!(items[0].get("subtitle").is_none());
    assert_eq!(items[1]["title"], "Older");
    assert_eq!(items[1]["subtitle"], "first");
    assert!(items[1]["image"].as_str().unwrap().ends_with("_photo.png"));
    assert!(items[1].get("storagePath").is_none());
    assert!(items[1].get("storage_path").is_none());
}

#[actix_rt::test]
async fn test_delete_endpoint() {
    let (ctx, storage, records) = TestContext::in_memory();
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;
    let bearer = ctx.bearer();

    let (content_type, body) = upload_form("a.png", "image/png", &png_bytes(400, 400), "A", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, bearer.clone()))
        .set_payload(body)
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_owned();

    // No credentials.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/gallery/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(records.len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/gallery/{}", id))
        .insert_header((header::AUTHORIZATION, bearer.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(records.len(), 0);
    assert_eq!(storage.len(), 0);

    // Second delete of the same id.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/gallery/{}", id))
        .insert_header((header::AUTHORIZATION, bearer.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Not found");

    // Not a UUID at all.
    let req = test::TestRequest::delete()
        .uri("/api/gallery/not-an-id")
        .insert_header((header::AUTHORIZATION, bearer))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_storage_failure_is_not_leaked() {
    let (ctx, storage, _records) = TestContext::in_memory();
    storage
        .fail_put
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let app = test::init_service(App::new().configure(|cfg| ctx.configure(cfg))).await;

    let (content_type, body) = upload_form("a.png", "image/png", &png_bytes(400, 400), "A", "");
    let req = test::TestRequest::post()
        .uri("/api/upload-gallery")
        .insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::AUTHORIZATION, ctx.bearer()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Internal server error");
}
