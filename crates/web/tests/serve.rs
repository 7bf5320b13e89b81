use std::sync::Arc;

use http_body_util::BodyExt;
use serde_json::json;
use tellerkit_web::{handler, App, AppSurface, MemoryFs, Middleware};
use tower::ServiceExt;

fn app() -> App {
    let fs = MemoryFs::new().with_file("/v/page.ejs", "<p><%= message %></p>");
    let mut app = App::new(Arc::new(fs));
    app.set("views", json!("/v"));
    app.use_middleware(Middleware::UrlEncoded);
    app.post(
        "/submit",
        handler(|req, res| {
            let message = req.body_text("message").unwrap_or_default();
            res.render("page", json!({ "message": message }))
        }),
    );
    app
}

#[tokio::test]
async fn test_form_post_renders_over_axum() {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/submit")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(axum::body::Body::from("message=Transfer+Completed"))
        .unwrap();
    let response = tellerkit_web::serve::router(app())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"<p>Transfer Completed</p>");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let request = axum::http::Request::builder()
        .uri("/missing?x=1")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tellerkit_web::serve::router(app())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
