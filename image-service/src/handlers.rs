//! HTTP handlers for image upload and download.

use std::sync::{Arc, LazyLock};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use regex::Regex;
use tracing::{error, info};

use crate::storage::{content_type_for, Local, StorageError};

/// Filenames look like `coffee.png`: letters, a dot, a three letter
/// lowercase extension. Everything else is rejected before it reaches the
/// filesystem.
static FILENAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+\.[a-z]{3}$").expect("valid filename regex"));

pub struct AppState {
    pub store: Local,
}

fn storage_error_response(err: StorageError) -> Response {
    match err {
        StorageError::TooLarge(limit) => (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("file exceeds the maximum allowed size of {} bytes", limit),
        )
            .into_response(),
        StorageError::NotFound => (StatusCode::NOT_FOUND, "file not found").into_response(),
        StorageError::Io(err) => {
            error!(error = %err, "Storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "unable to access the file").into_response()
        }
    }
}

/// `POST /images/{id}/{filename}` - saves the raw request body.
pub async fn upload_rest(
    State(state): State<Arc<AppState>>,
    Path((id, filename)): Path<(u64, String)>,
    body: Bytes,
) -> Response {
    if !FILENAME_PATTERN.is_match(&filename) {
        return (
            StatusCode::BAD_REQUEST,
            "invalid file path, should be in the format /images/{id}/{name.ext}",
        )
            .into_response();
    }

    info!(id, %filename, "Handling REST upload");
    save(&state, id, &filename, &body).await
}

/// `POST /images` - multipart upload with an `id` field and a `file` part.
pub async fn upload_multipart(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut id: Option<u64> = None;
    let mut file: Option<(String, Bytes)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("unable to parse form: {}", err),
                )
                    .into_response();
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "id" => match field.text().await.ok().and_then(|v| v.parse().ok()) {
                Some(parsed) => id = Some(parsed),
                None => {
                    return (StatusCode::BAD_REQUEST, "invalid 'id' in form data")
                        .into_response();
                }
            },
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes)),
                    Err(err) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            format!("unable to read file from form data: {}", err),
                        )
                            .into_response();
                    }
                }
            }
            _ => {}
        }
    }

    let Some(id) = id else {
        return (StatusCode::BAD_REQUEST, "missing 'id' in form data").into_response();
    };
    let Some((filename, contents)) = file else {
        return (StatusCode::BAD_REQUEST, "missing 'file' in form data").into_response();
    };
    if !FILENAME_PATTERN.is_match(&filename) {
        return (StatusCode::BAD_REQUEST, "invalid filename").into_response();
    }

    info!(id, %filename, "Handling multipart upload");
    save(&state, id, &filename, &contents).await
}

/// `GET /images/{id}/{filename}` - serves a stored image.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((id, filename)): Path<(u64, String)>,
) -> Response {
    if !FILENAME_PATTERN.is_match(&filename) {
        return (StatusCode::BAD_REQUEST, "invalid filename").into_response();
    }

    match state.store.get(&format!("{}/{}", id, filename)).await {
        Ok(contents) => (
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            contents,
        )
            .into_response(),
        Err(err) => storage_error_response(err),
    }
}

async fn save(state: &AppState, id: u64, filename: &str, contents: &[u8]) -> Response {
    match state.store.save(&format!("{}/{}", id, filename), contents).await {
        Ok(()) => (StatusCode::CREATED, "file uploaded successfully").into_response(),
        Err(err) => storage_error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_pattern() {
        for ok in ["coffee.png", "Cup.jpg", "a.gif"] {
            assert!(FILENAME_PATTERN.is_match(ok), "{} should match", ok);
        }
        for bad in ["coffee", "coffee.PNG", "../../etc.pwd", "a b.png", ".png"] {
            assert!(!FILENAME_PATTERN.is_match(bad), "{} should not match", bad);
        }
    }
}
