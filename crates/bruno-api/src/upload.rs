//! Multipart video intake.

use std::path::Path;

use axum::extract::Multipart;
use bruno_media::ArtifactJanitor;
use bruno_models::ArtifactKind;
use bruno_pipeline::PipelineRequest;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// Stream the `video` field into a fresh janitor-owned upload artifact.
///
/// On any error the janitor is dropped and the partial file goes with it.
pub async fn receive_video(multipart: &mut Multipart, work_dir: &Path) -> ApiResult<PipelineRequest> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            debug!(field = ?field.name(), "skipping multipart field");
            continue;
        }

        let is_video = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("video/"));
        if !is_video {
            return Err(ApiError::bad_request("Please upload a valid video file"));
        }

        let original_filename = field.file_name().map(str::to_string);
        let extension = upload_extension(original_filename.as_deref());

        let janitor = ArtifactJanitor::new(work_dir)
            .map_err(|e| ApiError::internal(format!("could not create work directory: {}", e)))?;
        let upload = janitor
            .acquire_with_extension(ArtifactKind::UploadedVideo, extension)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        let mut file = tokio::fs::File::create(upload.path())
            .await
            .map_err(|e| ApiError::internal(format!("could not store upload: {}", e)))?;
        let mut written = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Upload interrupted: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(format!("could not store upload: {}", e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal(format!("could not store upload: {}", e)))?;

        if written == 0 {
            return Err(ApiError::bad_request("Uploaded video is empty"));
        }

        info!(
            filename = original_filename.as_deref().unwrap_or("-"),
            bytes = written,
            "video received"
        );

        return Ok(PipelineRequest {
            janitor,
            upload,
            original_filename,
        });
    }

    Err(ApiError::bad_request("Missing 'video' file field"))
}

/// Extension kept from the client's file name when it is plain alphanumeric.
fn upload_extension(filename: Option<&str>) -> &str {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("mp4")
}
