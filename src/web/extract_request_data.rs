use std::collections::HashMap;

use axum::{
    Form,
    extract::{FromRequest, Multipart, Query, Request},
    http::{HeaderValue, header},
};
use mime::Mime;
use tracing::{debug, warn};

use super::{
    error::{ApiError, READ_FAILED, STREAM_FAILED},
    models::{UploadForm, UploadedImage},
};

const IMAGE_FIELD: &str = "image";

/// Collects query values, body form values and the `image` file part.
///
/// A request without a form body is not an error here: the handler decides
/// what is missing, so validation messages stay the same whether the body was
/// empty, urlencoded or multipart.
pub async fn extract_upload_form(mut request: Request) -> Result<UploadForm, ApiError> {
    let query_values = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(values)| values)
        .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e)))?;

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Mime>().ok());
    let is_form = |type_: mime::Name, subtype: mime::Name| {
        content_type
            .as_ref()
            .is_some_and(|m| m.type_() == type_ && m.subtype() == subtype)
    };

    let mut form = if is_form(mime::MULTIPART, mime::FORM_DATA) {
        extract_multipart_form(request).await?
    } else if is_form(mime::APPLICATION, mime::WWW_FORM_URLENCODED) {
        // `Form` only recognises the lowercase spelling.
        request.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let Form(values) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form body: {}", e)))?;
        UploadForm {
            values,
            image: None,
        }
    } else {
        debug!("No form body (content type: {:?})", content_type);
        UploadForm::default()
    };

    // A non-empty query value wins over the body value.
    form.values
        .extend(query_values.into_iter().filter(|(_, v)| !v.is_empty()));

    Ok(form)
}

async fn extract_multipart_form(request: Request) -> Result<UploadForm, ApiError> {
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(rejection) => {
            // Missing or malformed boundary: treat like an empty form.
            debug!("Ignoring unreadable multipart body: {}", rejection);
            return Ok(UploadForm::default());
        }
    };

    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            debug!("Ignoring unnamed multipart field");
            continue;
        };

        if name == IMAGE_FIELD && field.file_name().is_some() {
            if form.image.is_some() {
                warn!("Multiple 'image' fields found in multipart request, using the first one");
                continue;
            }

            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            debug!(
                "Received image part: file_name={:?}, content_type={:?}",
                file_name, content_type
            );

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::from_multipart(e, READ_FAILED))?;

            form.image = Some(UploadedImage {
                file_name,
                content_type,
                data,
            });
        } else if field.file_name().is_some() {
            debug!("Ignoring file field: {}", name);
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::from_multipart(e, STREAM_FAILED))?;
            // First occurrence wins.
            form.values.entry(name).or_insert(value);
        }
    }

    Ok(form)
}
