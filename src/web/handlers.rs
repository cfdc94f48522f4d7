// Handlers for the image endpoints

use axum::{
    extract::Request,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::{ApiError, DECODE_FAILED, INTERNAL_SERVER_ERROR, JPEG_OR_PNG_ONLY, PNG_ONLY},
    extract_request_data::extract_upload_form,
    image_codec::{ImageKind, OutputFormat, decode_color_image, encode_image, resize_exact},
    models::{RequestedSize, UploadedImage},
};

/// Runs CPU-bound codec work off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        warn!("Image task failed: {}", e);
        ApiError::internal(INTERNAL_SERVER_ERROR)
    })?
}

fn decode(data: &[u8]) -> Result<image::RgbImage, ApiError> {
    decode_color_image(data).map_err(|e| {
        warn!("Decode failed: {}", e);
        ApiError::internal(DECODE_FAILED)
    })
}

fn encode(
    image: image::RgbImage,
    format: OutputFormat,
    failure: &'static str,
) -> Result<Vec<u8>, ApiError> {
    encode_image(image, format).map_err(|e| {
        warn!("{} encode failed: {}", format.kind().name(), e);
        ApiError::internal(failure)
    })
}

/// Declared type must be JPEG or PNG; the output format then follows the file
/// extension, or the declared type when the extension says nothing.
fn jpeg_or_png(image: &UploadedImage) -> Result<ImageKind, ApiError> {
    let declared = image
        .content_type
        .as_deref()
        .and_then(ImageKind::from_declared_mime)
        .ok_or_else(|| ApiError::bad_request(JPEG_OR_PNG_ONLY))?;

    Ok(image
        .file_name
        .as_deref()
        .and_then(ImageKind::from_file_name)
        .unwrap_or(declared))
}

fn image_response(kind: ImageKind, bytes: Vec<u8>) -> Response {
    (TypedHeader(ContentType::from(kind.mime())), bytes).into_response()
}

// --- POST /converter ---
// Re-encodes a PNG upload as JPEG
pub async fn converter(request: Request) -> Result<Response, ApiError> {
    let image = extract_upload_form(request).await?.require_image()?;

    if image.content_type.as_deref() != Some("image/png") {
        return Err(ApiError::bad_request(PNG_ONLY));
    }

    let request_id = Uuid::new_v4();
    let data = image.data;
    let jpeg = run_blocking(move || {
        let decoded = decode(&data)?;
        encode(
            decoded,
            OutputFormat::standard(ImageKind::Jpeg),
            "Failed to convert image to JPG",
        )
    })
    .await?;

    info!(
        "Converter: request_id={}, from {} to {} ({} bytes)",
        request_id,
        ImageKind::Png.name(),
        ImageKind::Jpeg.name(),
        jpeg.len()
    );

    Ok(image_response(ImageKind::Jpeg, jpeg))
}

// --- POST /resizer?width=W&height=H ---
// Resizes to the requested dimensions, keeping the upload's format
pub async fn resizer(request: Request) -> Result<Response, ApiError> {
    let form = extract_upload_form(request).await?;
    let requested = RequestedSize::from_form(&form)?;
    let image = form.require_image()?;
    let kind = jpeg_or_png(&image)?;

    let request_id = Uuid::new_v4();
    let data = image.data;
    let (original, resized, bytes) = run_blocking(move || {
        let decoded = decode(&data)?;
        let original = decoded.dimensions();
        let (width, height) = requested.resolve(original.0, original.1)?;
        let resized = resize_exact(&decoded, width, height);
        drop(decoded);

        let dimensions = resized.dimensions();
        let bytes = encode(
            resized,
            OutputFormat::standard(kind),
            "Failed to resize image dimension",
        )?;
        Ok((original, dimensions, bytes))
    })
    .await?;

    info!(
        "Resizer: request_id={}, original {} x {}, resized {} x {} ({})",
        request_id,
        original.0,
        original.1,
        resized.0,
        resized.1,
        kind.name()
    );

    Ok(image_response(kind, bytes))
}

// --- POST /compressor ---
// Re-encodes with fixed lossy parameters in the upload's format
pub async fn compressor(request: Request) -> Result<Response, ApiError> {
    let image = extract_upload_form(request).await?.require_image()?;
    let kind = jpeg_or_png(&image)?;

    let request_id = Uuid::new_v4();
    let before = image.data.len();
    let data = image.data;
    let bytes = run_blocking(move || {
        let decoded = decode(&data)?;
        encode(
            decoded,
            OutputFormat::compressed(kind),
            "Failed to compress image size",
        )
    })
    .await?;

    info!(
        "Compressor: request_id={}, before {} bytes, after {} bytes ({})",
        request_id,
        before,
        bytes.len(),
        kind.name()
    );

    Ok(image_response(kind, bytes))
}

pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Cannot {} {}", method, uri.path()))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method Not Allowed".to_string())
}
