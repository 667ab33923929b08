//! The small MIME tables the bridge needs in both directions.

/// Extension (with dot) for a staged inbound image. Unknown types get `.jpg`.
pub fn image_extension(mime_type: &str) -> &'static str {
    match base_type(mime_type).as_str() {
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        _ => ".jpg",
    }
}

/// MIME type for an outbox file, by extension. `None` means "do not send".
pub fn from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

/// `image/jpeg; charset=...` -> `image/jpeg`
fn base_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
