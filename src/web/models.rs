// Request-side data models for the image endpoints

use std::collections::HashMap;

use axum::body::Bytes;

use super::error::{ApiError, DIMENSIONS_REQUIRED, INVALID_DIMENSIONS, MISSING_IMAGE_FIELD};

/// Largest RGB buffer the resizer will allocate, matching the decoder's
/// default allocation limit.
pub const MAX_OUTPUT_BYTES: i128 = 512 * 1024 * 1024;

/// File part of an upload. Name and content type are whatever the client
/// declared.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Everything a request carried: text values (query string first, then the
/// body form) and the first `image` file part.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub values: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

impl UploadForm {
    /// Value of a text field, falling back to `default` when absent or empty.
    pub fn value_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
    }

    pub fn require_image(self) -> Result<UploadedImage, ApiError> {
        self.image
            .ok_or_else(|| ApiError::bad_request(MISSING_IMAGE_FIELD))
    }
}

/// Target size as requested. Non-positive values mean "derive from the other
/// axis".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedSize {
    pub width: i64,
    pub height: i64,
}

impl RequestedSize {
    pub fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        let width = parse_dimension(form.value_or("width", "0"), "width")?;
        let height = parse_dimension(form.value_or("height", "0"), "height")?;

        if width <= 0 && height <= 0 {
            return Err(ApiError::bad_request(DIMENSIONS_REQUIRED));
        }

        Ok(Self { width, height })
    }

    /// Concrete output size for a source image of `src_width` x `src_height`.
    /// A missing axis is scaled from the given one so the aspect ratio holds.
    /// Fails when the output RGB buffer would exceed [`MAX_OUTPUT_BYTES`].
    pub fn resolve(&self, src_width: u32, src_height: u32) -> Result<(u32, u32), ApiError> {
        let (src_w, src_h) = (i128::from(src_width), i128::from(src_height));
        let (req_w, req_h) = (i128::from(self.width), i128::from(self.height));

        let (width, height) = match (req_w > 0, req_h > 0) {
            (true, true) => (req_w, req_h),
            (true, false) => (req_w, scale_axis(req_w, src_h, src_w)),
            (false, true) => (scale_axis(req_h, src_w, src_h), req_h),
            (false, false) => return Err(ApiError::bad_request(DIMENSIONS_REQUIRED)),
        };

        if width.saturating_mul(height).saturating_mul(3) > MAX_OUTPUT_BYTES {
            return Err(ApiError::bad_request(INVALID_DIMENSIONS));
        }

        // Both are at least 1 and their product is bounded, so each fits in u32.
        Ok((width as u32, height as u32))
    }
}

fn scale_axis(known: i128, numerator: i128, denominator: i128) -> i128 {
    if denominator == 0 {
        return 1;
    }
    ((known * numerator + denominator / 2) / denominator).max(1)
}

fn parse_dimension(value: &str, field: &str) -> Result<i64, ApiError> {
    value.parse::<i64>().map_err(|_| {
        ApiError::bad_request(format!(
            "Please provide only an integer number for `{}`!",
            field
        ))
    })
}
