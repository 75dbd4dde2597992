//! Audio upload endpoint

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use ingest_common::{time, AudioMessage};
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::AppState;

/// Multipart field carrying the raw audio bytes
pub const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub partition: i32,
    pub offset: i64,
}

/// POST /api/v1/client/:id/upload/:ts
///
/// `ts` is the capture time in nanoseconds since the Unix epoch.
pub async fn upload_audio(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((client_id, ts)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let timestamp = time::parse_unix_nanos(&ts)
        .map_err(|e| Error::BadRequest(format!("invalid timestamp {:?}: {}", ts, e)))?;
    let payload = read_audio_field(multipart).await?;

    let receipt = state
        .audio
        .upload(&ctx, &client_id, AudioMessage { timestamp, payload })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            status: "ok",
            partition: receipt.partition,
            offset: receipt.offset,
        }),
    ))
}

async fn read_audio_field(mut multipart: Multipart) -> Result<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::BadRequest(format!("can't read audio field: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(Error::BadRequest(format!(
        "multipart field {:?} is missing",
        AUDIO_FIELD
    )))
}
