//! Multipart form model and validation for image generation requests.
//!
//! Every field is checked by its own function returning a
//! `Result<_, ValidationError>`; the results are folded into one
//! `ValidationErrors` so a rejected request reports all of its problems at
//! once.

use crate::services::providers::InpaintInput;
use axum::body::Bytes;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

pub const PROMPT_MIN_LEN: usize = 15;
pub const PROMPT_MAX_LEN: usize = 255;

pub const MAX_IMAGE_SIZE_BYTES: usize = 5_000_000;
pub const ACCEPTED_IMAGE_TYPE_PREFIX: &str = "image/";

pub const DEFAULT_GUIDANCE: f64 = 0.75;
pub const DEFAULT_STRENGTH: f64 = 0.5;

const UNSUPPORTED_IMAGE_TYPE: &str = "unsupported image type";

/// A file part of the submitted form.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    /// Declared media type; empty when the part carried none.
    pub content_type: String,
    /// Full size of the part as sent. `data` stops growing once this passes
    /// `MAX_IMAGE_SIZE_BYTES`, so the two differ only for oversized uploads.
    pub size: usize,
    pub data: Bytes,
}

/// One multipart entry. Parts with a filename are files, the rest are text.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(ImageUpload),
}

impl FormValue {
    pub fn text(value: impl Into<String>) -> Self {
        FormValue::Text(value.into())
    }

    pub fn file(content_type: &str, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        FormValue::File(ImageUpload {
            file_name: None,
            content_type: content_type.to_string(),
            size: data.len(),
            data,
        })
    }
}

/// Raw, unvalidated form fields.
#[derive(Debug, Clone, Default)]
pub struct GenerationForm {
    pub prompt: Option<FormValue>,
    pub image: Option<FormValue>,
    pub mask: Option<FormValue>,
    pub width: Option<FormValue>,
    pub height: Option<FormValue>,
    pub guidance: Option<FormValue>,
    pub strength: Option<FormValue>,
    pub seed: Option<FormValue>,
}

/// A request that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<ImageUpload>,
    pub mask: Option<ImageUpload>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub guidance: f64,
    pub strength: f64,
    pub seed: Option<f64>,
}

impl GenerationForm {
    /// Store a multipart entry under its field name.
    ///
    /// A repeated name replaces the earlier value. Returns `false` for names
    /// outside the schema, which are dropped.
    pub fn insert(&mut self, name: &str, value: FormValue) -> bool {
        let slot = match name {
            "prompt" => &mut self.prompt,
            "image" => &mut self.image,
            "mask" => &mut self.mask,
            "width" => &mut self.width,
            "height" => &mut self.height,
            "guidance" => &mut self.guidance,
            "strength" => &mut self.strength,
            "seed" => &mut self.seed,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Validate every field and coerce numbers, collecting all issues.
    pub fn validate(self) -> Result<GenerationRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let prompt = collect(&mut errors, "prompt", validate_prompt(self.prompt));
        let image = collect(&mut errors, "image", validate_image(self.image));
        let mask = collect(&mut errors, "mask", validate_image(self.mask));
        let width = collect(&mut errors, "width", validate_number(self.width));
        let height = collect(&mut errors, "height", validate_number(self.height));
        let guidance = collect(
            &mut errors,
            "guidance",
            validate_unit_interval(self.guidance, DEFAULT_GUIDANCE),
        );
        let strength = collect(
            &mut errors,
            "strength",
            validate_unit_interval(self.strength, DEFAULT_STRENGTH),
        );
        let seed = collect(&mut errors, "seed", validate_non_negative(self.seed));

        match (prompt, image, mask, width, height, guidance, strength, seed) {
            (
                Some(prompt),
                Some(image),
                Some(mask),
                Some(width),
                Some(height),
                Some(guidance),
                Some(strength),
                Some(seed),
            ) if errors.is_empty() => Ok(GenerationRequest {
                prompt,
                image,
                mask,
                width,
                height,
                guidance,
                strength,
                seed,
            }),
            _ => Err(errors),
        }
    }
}

impl GenerationRequest {
    /// Build the inference input. Files become raw byte arrays; absent files
    /// stay absent.
    pub fn into_inference_input(self) -> InpaintInput {
        InpaintInput {
            prompt: self.prompt,
            image: self.image.map(|upload| upload.data.to_vec()),
            mask: self.mask.map(|upload| upload.data.to_vec()),
            width: self.width,
            height: self.height,
            guidance: self.guidance,
            strength: self.strength,
            seed: self.seed,
        }
    }
}

fn collect<T>(
    errors: &mut ValidationErrors,
    field: &'static str,
    result: Result<T, ValidationError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.add(field, error);
            None
        }
    }
}

fn issue(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

pub fn validate_prompt(value: Option<FormValue>) -> Result<String, ValidationError> {
    let prompt = match value {
        None => return Err(issue("required", "Prompt required")),
        Some(FormValue::File(_)) => {
            return Err(issue("invalid_type", "Expected string, received file"))
        }
        Some(FormValue::Text(prompt)) => prompt,
    };

    // Lengths are counted the way browsers count form text: UTF-16 units.
    let len = prompt.encode_utf16().count();

    if len < PROMPT_MIN_LEN {
        let mut error = issue(
            "too_small",
            format!(
                "String must contain at least {} character(s)",
                PROMPT_MIN_LEN
            ),
        );
        error.add_param(Cow::from("min"), &PROMPT_MIN_LEN);
        return Err(error);
    }

    if len > PROMPT_MAX_LEN {
        let mut error = issue(
            "too_big",
            format!("String must contain at most {} character(s)", PROMPT_MAX_LEN),
        );
        error.add_param(Cow::from("max"), &PROMPT_MAX_LEN);
        return Err(error);
    }

    Ok(prompt)
}

/// Optional image field: absent is fine, anything present must be a usable
/// image upload.
pub fn validate_image(value: Option<FormValue>) -> Result<Option<ImageUpload>, ValidationError> {
    match value {
        None => Ok(None),
        Some(FormValue::Text(_)) => Err(issue("custom", UNSUPPORTED_IMAGE_TYPE)),
        Some(FormValue::File(upload)) => {
            check_image_upload(&upload)?;
            Ok(Some(upload))
        }
    }
}

/// Empty, oversized or non-image uploads are rejected, checked in that order.
pub fn check_image_upload(upload: &ImageUpload) -> Result<(), ValidationError> {
    if upload.size == 0 {
        return Err(issue("custom", UNSUPPORTED_IMAGE_TYPE));
    }

    if upload.size > MAX_IMAGE_SIZE_BYTES {
        let mut error = issue(
            "custom",
            format!("max image size is {}MB", MAX_IMAGE_SIZE_BYTES / 1_000_000),
        );
        error.add_param(Cow::from("max_bytes"), &MAX_IMAGE_SIZE_BYTES);
        error.add_param(Cow::from("size"), &upload.size);
        return Err(error);
    }

    if !upload.content_type.starts_with(ACCEPTED_IMAGE_TYPE_PREFIX) {
        let mut error = issue("custom", UNSUPPORTED_IMAGE_TYPE);
        error.add_param(Cow::from("content_type"), &upload.content_type);
        return Err(error);
    }

    Ok(())
}

/// Coerce a form value to a finite number.
///
/// Surrounding whitespace is ignored and blank text reads as zero, the same
/// as numeric coercion of form strings in browsers. Besides decimal and
/// exponent literals, unsigned `0x`, `0o` and `0b` integers are accepted.
pub fn coerce_number(value: &FormValue) -> Result<f64, ValidationError> {
    let not_a_number = || issue("invalid_type", "Expected number, received nan");

    let text = match value {
        FormValue::Text(text) => text.trim(),
        FormValue::File(_) => return Err(not_a_number()),
    };

    if text.is_empty() {
        return Ok(0.0);
    }

    if let Some(number) = parse_radix_literal(text) {
        return number.ok_or_else(not_a_number);
    }

    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(not_a_number()),
    }
}

/// `Some` when `text` carries a radix prefix: the parsed value, or `None` if
/// the digits are invalid for that radix.
fn parse_radix_literal(text: &str) -> Option<Option<f64>> {
    let prefix = text.get(..2)?.to_ascii_lowercase();
    let radix = match prefix.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };

    let digits = &text[2..];
    if digits.is_empty() {
        return Some(None);
    }

    let number = digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    });
    Some(number.filter(|n| n.is_finite()))
}

fn validate_number(value: Option<FormValue>) -> Result<Option<f64>, ValidationError> {
    value.as_ref().map(coerce_number).transpose()
}

fn validate_unit_interval(
    value: Option<FormValue>,
    default: f64,
) -> Result<f64, ValidationError> {
    let number = match value {
        None => return Ok(default),
        Some(value) => coerce_number(&value)?,
    };
    check_min(number, 0.0)?;
    check_max(number, 1.0)?;
    Ok(number)
}

fn validate_non_negative(value: Option<FormValue>) -> Result<Option<f64>, ValidationError> {
    let number = validate_number(value)?;
    if let Some(number) = number {
        check_min(number, 0.0)?;
    }
    Ok(number)
}

fn check_min(number: f64, min: f64) -> Result<(), ValidationError> {
    if number < min {
        let mut error = issue(
            "too_small",
            format!("Number must be greater than or equal to {}", min),
        );
        error.add_param(Cow::from("min"), &min);
        error.add_param(Cow::from("value"), &number);
        return Err(error);
    }
    Ok(())
}

fn check_max(number: f64, max: f64) -> Result<(), ValidationError> {
    if number > max {
        let mut error = issue(
            "too_big",
            format!("Number must be less than or equal to {}", max),
        );
        error.add_param(Cow::from("max"), &max);
        error.add_param(Cow::from("value"), &number);
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "a photorealistic cat on a sofa";

    fn form_with_prompt(prompt: &str) -> GenerationForm {
        GenerationForm {
            prompt: Some(FormValue::text(prompt)),
            ..Default::default()
        }
    }

    fn png(len: usize) -> FormValue {
        FormValue::file("image/png", vec![7u8; len])
    }

    fn messages(errors: &ValidationErrors, field: &str) -> Vec<String> {
        errors
            .field_errors()
            .into_iter()
            .filter(|(name, _)| *name == field)
            .flat_map(|(_, errs)| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .collect()
    }

    #[test]
    fn minimal_request_gets_defaults() {
        let request = form_with_prompt(PROMPT).validate().unwrap();

        assert_eq!(request.prompt, PROMPT);
        assert_eq!(request.image, None);
        assert_eq!(request.mask, None);
        assert_eq!(request.width, None);
        assert_eq!(request.height, None);
        assert_eq!(request.guidance, DEFAULT_GUIDANCE);
        assert_eq!(request.strength, DEFAULT_STRENGTH);
        assert_eq!(request.seed, None);
    }

    #[test]
    fn missing_prompt_is_required() {
        let errors = GenerationForm::default().validate().unwrap_err();
        assert_eq!(messages(&errors, "prompt"), vec!["Prompt required"]);
    }

    #[test]
    fn prompt_length_bounds() {
        assert!(form_with_prompt(&"a".repeat(14)).validate().is_err());
        assert!(form_with_prompt(&"a".repeat(15)).validate().is_ok());
        assert!(form_with_prompt(&"a".repeat(255)).validate().is_ok());

        let errors = form_with_prompt(&"a".repeat(256)).validate().unwrap_err();
        assert_eq!(
            messages(&errors, "prompt"),
            vec!["String must contain at most 255 character(s)"]
        );

        let errors = form_with_prompt("short").validate().unwrap_err();
        assert_eq!(
            messages(&errors, "prompt"),
            vec!["String must contain at least 15 character(s)"]
        );
    }

    #[test]
    fn prompt_length_counts_utf16_units() {
        // Each emoji is two UTF-16 units: 8 of them make 16 units.
        let prompt = "\u{1F408}".repeat(8);
        assert!(form_with_prompt(&prompt).validate().is_ok());
    }

    #[test]
    fn prompt_uploaded_as_file_is_rejected() {
        let form = GenerationForm {
            prompt: Some(FormValue::file("text/plain", PROMPT.as_bytes().to_vec())),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            messages(&errors, "prompt"),
            vec!["Expected string, received file"]
        );
    }

    #[test]
    fn empty_image_is_unsupported() {
        let mut form = form_with_prompt(PROMPT);
        form.image = Some(png(0));
        let errors = form.validate().unwrap_err();
        assert_eq!(messages(&errors, "image"), vec!["unsupported image type"]);
    }

    #[test]
    fn image_size_limit_is_inclusive() {
        let mut form = form_with_prompt(PROMPT);
        form.image = Some(png(MAX_IMAGE_SIZE_BYTES));
        assert!(form.validate().is_ok());

        let mut form = form_with_prompt(PROMPT);
        form.image = Some(png(MAX_IMAGE_SIZE_BYTES + 1));
        let errors = form.validate().unwrap_err();
        assert_eq!(messages(&errors, "image"), vec!["max image size is 5MB"]);
    }

    #[test]
    fn non_image_media_type_is_unsupported() {
        for content_type in ["text/plain", "", "application/octet-stream", "imag/png"] {
            let mut form = form_with_prompt(PROMPT);
            form.mask = Some(FormValue::file(content_type, vec![1u8; 10]));
            let errors = form.validate().unwrap_err();
            assert_eq!(
                messages(&errors, "mask"),
                vec!["unsupported image type"],
                "content type {:?}",
                content_type
            );
        }
    }

    #[test]
    fn text_in_image_field_is_unsupported() {
        let mut form = form_with_prompt(PROMPT);
        form.image = Some(FormValue::text("not a file"));
        let errors = form.validate().unwrap_err();
        assert_eq!(messages(&errors, "image"), vec!["unsupported image type"]);
    }

    #[test]
    fn oversized_check_runs_before_type_check() {
        let upload = ImageUpload {
            file_name: Some("huge.txt".to_string()),
            content_type: "text/plain".to_string(),
            size: MAX_IMAGE_SIZE_BYTES + 1,
            data: Bytes::from(vec![0u8; MAX_IMAGE_SIZE_BYTES + 1]),
        };
        let error = check_image_upload(&upload).unwrap_err();
        assert_eq!(error.message.unwrap(), "max image size is 5MB");
    }

    #[test]
    fn declared_size_decides_oversize() {
        // Only the head of a huge part is buffered.
        let upload = ImageUpload {
            file_name: Some("huge.png".to_string()),
            content_type: "image/png".to_string(),
            size: 40_000_000,
            data: Bytes::from(vec![0u8; 16]),
        };
        let error = check_image_upload(&upload).unwrap_err();
        assert_eq!(error.message.unwrap(), "max image size is 5MB");
    }

    #[test]
    fn radix_literals_are_numbers() {
        assert_eq!(coerce_number(&FormValue::text("0x200")).unwrap(), 512.0);
        assert_eq!(coerce_number(&FormValue::text("0X1f")).unwrap(), 31.0);
        assert_eq!(coerce_number(&FormValue::text("0o17")).unwrap(), 15.0);
        assert_eq!(coerce_number(&FormValue::text(" 0b101 ")).unwrap(), 5.0);

        for text in ["0x", "0xZZ", "0b102", "-0x10"] {
            assert!(coerce_number(&FormValue::text(text)).is_err(), "{:?}", text);
        }
    }

    #[test]
    fn image_and_mask_are_converted_to_bytes() {
        let mut form = form_with_prompt(PROMPT);
        form.image = Some(FormValue::file("image/png", vec![1u8, 2, 3]));
        form.mask = Some(FormValue::file("image/jpeg", vec![255u8]));

        let input = form.validate().unwrap().into_inference_input();
        assert_eq!(input.image, Some(vec![1, 2, 3]));
        assert_eq!(input.mask, Some(vec![255]));
    }

    #[test]
    fn numeric_fields_are_coerced_from_text() {
        let mut form = form_with_prompt(PROMPT);
        form.width = Some(FormValue::text("512"));
        form.height = Some(FormValue::text(" 768 "));
        form.guidance = Some(FormValue::text("0.9"));
        form.strength = Some(FormValue::text("1"));
        form.seed = Some(FormValue::text("42"));

        let request = form.validate().unwrap();
        assert_eq!(request.width, Some(512.0));
        assert_eq!(request.height, Some(768.0));
        assert_eq!(request.guidance, 0.9);
        assert_eq!(request.strength, 1.0);
        assert_eq!(request.seed, Some(42.0));
    }

    #[test]
    fn blank_number_reads_as_zero() {
        assert_eq!(coerce_number(&FormValue::text("")).unwrap(), 0.0);
        assert_eq!(coerce_number(&FormValue::text("   ")).unwrap(), 0.0);
    }

    #[test]
    fn non_numeric_text_is_rejected() {
        for text in ["abc", "12px", "NaN", "inf", "1,5"] {
            let error = coerce_number(&FormValue::text(text)).unwrap_err();
            assert_eq!(error.code, "invalid_type", "input {:?}", text);
        }
    }

    #[test]
    fn guidance_and_strength_must_be_in_unit_interval() {
        let mut form = form_with_prompt(PROMPT);
        form.guidance = Some(FormValue::text("1.5"));
        form.strength = Some(FormValue::text("-0.1"));

        let errors = form.validate().unwrap_err();
        assert_eq!(
            messages(&errors, "guidance"),
            vec!["Number must be less than or equal to 1"]
        );
        assert_eq!(
            messages(&errors, "strength"),
            vec!["Number must be greater than or equal to 0"]
        );
    }

    #[test]
    fn width_and_height_are_unbounded() {
        let mut form = form_with_prompt(PROMPT);
        form.width = Some(FormValue::text("-64"));
        form.height = Some(FormValue::text("100000"));

        let request = form.validate().unwrap();
        assert_eq!(request.width, Some(-64.0));
        assert_eq!(request.height, Some(100000.0));
    }

    #[test]
    fn negative_seed_is_rejected() {
        let mut form = form_with_prompt(PROMPT);
        form.seed = Some(FormValue::text("-1"));
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 1);
        assert_eq!(
            messages(&errors, "seed"),
            vec!["Number must be greater than or equal to 0"]
        );
    }

    #[test]
    fn all_issues_are_reported_together() {
        let form = GenerationForm {
            prompt: Some(FormValue::text("short")),
            image: Some(png(0)),
            guidance: Some(FormValue::text("2")),
            seed: Some(FormValue::text("x")),
            ..Default::default()
        };

        let errors = form.validate().unwrap_err();
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        assert_eq!(fields, vec!["guidance", "image", "prompt", "seed"]);
    }

    #[test]
    fn insert_keeps_last_value_and_ignores_unknown_fields() {
        let mut form = GenerationForm::default();
        assert!(form.insert("prompt", FormValue::text("first")));
        assert!(form.insert("prompt", FormValue::text(PROMPT)));
        assert!(!form.insert("steps", FormValue::text("20")));

        assert_eq!(form.prompt, Some(FormValue::text(PROMPT)));
    }
}
