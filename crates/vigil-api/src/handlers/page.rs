//! Browser camera page.

use axum::response::Html;

const CAMERA_PAGE: &str = include_str!("../../static/camera.html");

/// Page that streams webcam frames to `/detect` and shows pushed alerts.
pub async fn camera_page() -> Html<&'static str> {
    Html(CAMERA_PAGE)
}
