use crate::dtos::generation::MAX_IMAGE_SIZE_BYTES;
use crate::dtos::{FormValue, GenerationForm, ImageUpload};
use crate::middleware::AccessGranted;
use crate::services::metrics::{record_inference, record_outcome, Outcome};
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
};
use service_core::error::AppError;
use std::time::Instant;

/// Generate an image from a multipart prompt submission.
///
/// Access key, then validation of the whole form, then one inference run.
/// Answers with the PNG produced by the provider.
pub async fn generate_image(
    State(state): State<AppState>,
    _access: AccessGranted,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let multipart = multipart.map_err(|e| {
        record_outcome(Outcome::Invalid);
        AppError::BadRequest(anyhow::anyhow!("Expected multipart form data: {}", e))
    })?;

    let form = read_form(multipart).await.map_err(|e| {
        record_outcome(Outcome::Invalid);
        e
    })?;

    let request = form.validate().map_err(|errors| {
        tracing::warn!(
            issue_count = errors.field_errors().len(),
            "Rejected invalid generation request"
        );
        record_outcome(Outcome::Invalid);
        AppError::from(errors)
    })?;

    let model = state.provider.model().to_string();
    tracing::info!(
        model = %model,
        prompt_len = request.prompt.len(),
        has_image = request.image.is_some(),
        has_mask = request.mask.is_some(),
        guidance = request.guidance,
        strength = request.strength,
        "Running image generation"
    );

    let input = request.into_inference_input();
    let started = Instant::now();
    let result = state.provider.generate(&input).await;
    record_inference(&model, started.elapsed(), result.is_ok());

    let image = result.map_err(|e| {
        tracing::error!(model = %model, error = %e, "Image generation failed");
        record_outcome(Outcome::Failed);
        AppError::from(e)
    })?;

    tracing::info!(
        model = %model,
        image_bytes = image.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Image generation completed"
    );
    record_outcome(Outcome::Generated);

    Ok((
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CONTENT_TYPE, "image/png"),
        ],
        image,
    ))
}

/// Drain the multipart body into a form. Parts with a filename are kept as
/// files, everything else as text.
async fn read_form(mut multipart: Multipart) -> Result<GenerationForm, AppError> {
    let mut form = GenerationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to read multipart field"))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => FormValue::File(read_upload(field, file_name).await?),
            None => FormValue::Text(
                field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, &format!("Failed to read field {}", name)))?,
            ),
        };

        if !form.insert(&name, value) {
            tracing::debug!(field = %name, "Ignoring unknown form field");
        }
    }

    Ok(form)
}

/// Stream a file part. Its full size is counted, but buffering stops once it
/// passes `MAX_IMAGE_SIZE_BYTES`.
async fn read_upload(mut field: Field<'_>, file_name: String) -> Result<ImageUpload, AppError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    let mut data = Vec::new();
    let mut size = 0usize;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, &format!("Failed to read file {}", file_name)))?
    {
        size = size.saturating_add(chunk.len());
        if size <= MAX_IMAGE_SIZE_BYTES {
            data.extend_from_slice(&chunk);
        }
    }

    if size > MAX_IMAGE_SIZE_BYTES {
        tracing::debug!(file = %file_name, size, "Discarded oversized upload");
        data.clear();
    }

    Ok(ImageUpload {
        file_name: Some(file_name),
        content_type,
        size,
        data: Bytes::from(data),
    })
}

/// Keep the status multer reports: a body over the transport limit is a 413.
fn multipart_error(err: MultipartError, context: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(anyhow::anyhow!("{}: {}", context, err.body_text()))
    }
}
