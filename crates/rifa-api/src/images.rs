use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AppState;

/// Serve a raffle's cover image through the local cache. Every failure —
/// unknown raffle, empty URL, fetch timeout, disk trouble — degrades to a
/// plain 404 so the frontend can show its placeholder; nothing here is ever
/// a hard error for the caller.
pub async fn raffle_image(State(state): State<AppState>, Path(raffle_id): Path<Uuid>) -> Response {
    match serve_image(&state, raffle_id).await {
        Some(resp) => resp,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_image(state: &AppState, raffle_id: Uuid) -> Option<Response> {
    let db = state.clone();
    let id = raffle_id.to_string();
    let raffle = match tokio::task::spawn_blocking(move || db.db.get_raffle(&id)).await {
        Ok(Ok(Some(raffle))) => raffle,
        Ok(Ok(None)) => return None,
        Ok(Err(e)) => {
            warn!("Raffle lookup failed for image {}: {}", raffle_id, e);
            return None;
        }
        Err(e) => {
            warn!("spawn_blocking join error: {}", e);
            return None;
        }
    };

    if raffle.image_url.is_empty() {
        return None;
    }

    let filename = cache_filename(raffle_id, &raffle.image_url);
    let path = state.image_cache_dir.join(&filename);

    // Cache hit
    if let Ok(bytes) = fs::read(&path).await {
        return Some(image_response(&filename, bytes));
    }

    // Fetch with the short-timeout client and write through to the cache
    let resp = match state
        .http
        .get(&raffle.image_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Image fetch failed for raffle {}: {}", raffle_id, e);
            return None;
        }
    };

    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Image body read failed for raffle {}: {}", raffle_id, e);
            return None;
        }
    };

    // A failed cache write is not fatal; the bytes are already in hand
    if let Err(e) = fs::write(&path, &bytes).await {
        warn!("Image cache write failed for raffle {}: {}", raffle_id, e);
    }

    Some(image_response(&filename, bytes.to_vec()))
}

/// Stable cache name derived from the URL: the raffle id plus a sha256
/// prefix and the URL's extension, so a changed URL gets a fresh entry.
fn cache_filename(raffle_id: Uuid, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let suffix = std::path::Path::new(trimmed)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".img".into());

    format!("{}-{}{}", raffle_id, &hash[..24], suffix)
}

fn image_response(filename: &str, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type(filename))], bytes).into_response()
}

fn content_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
