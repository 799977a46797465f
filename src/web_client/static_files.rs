//! Embedded static asset serving for the SPA.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

use crate::web_client::utils::api_error;

#[derive(Embed)]
#[folder = "web/dist/"]
struct Assets;

pub async fn static_handler(uri: axum::http::Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if path == "api" || path.starts_with("api/") {
        return api_error(StatusCode::NOT_FOUND, "no such endpoint");
    }
    let path = if path.is_empty() { "index.html" } else { path };

    let (path, content) = match Assets::get(path) {
        Some(content) => (path, content),
        // Client-side routes (/dashboard, /secret-page-2, ...) get the SPA shell
        None => match Assets::get("index.html") {
            Some(content) => ("index.html", content),
            None => return (StatusCode::NOT_FOUND, "not found").into_response(),
        },
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime.as_ref())],
        content.data.to_vec(),
    )
        .into_response()
}
