// Form data processing for Whisper Queue
//
// Parses the multipart body of `POST /add-job/{priority}-priority`: a `language`
// field, an optional `expiration_sec` field and one or more `audio_files` parts.

use actix_multipart::{Field, Multipart};
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::models::{AudioUpload, JobRequestParams};

/// Extension used when the uploaded file name has none
pub const FALLBACK_EXTENSION: &str = "bin";

/// Extract and process multipart form data for add-job requests
///
/// # Errors
///
/// * `FormError` for a missing language or a malformed expiration
/// * `NoAudioFile` when no `audio_files` part was sent
/// * `FileTooLarge` when one file exceeds `config.max_file_size`
pub async fn extract_job_form(
    mut form: Multipart,
    config: &HandlerConfig,
) -> Result<JobRequestParams, HandlerError> {
    let mut params = JobRequestParams {
        language: String::new(),
        expiration_secs: config.default_expiration_secs,
        audio_files: Vec::new(),
    };

    loop {
        let mut field = match form.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(HandlerError::form_error(format!(
                    "Invalid multipart body: {}",
                    e
                )))
            }
        };

        let content_disposition = field.content_disposition();
        let field_name = content_disposition
            .and_then(|cd| cd.get_name().map(|name| name.to_string()))
            .unwrap_or_default();
        let file_name = content_disposition
            .and_then(|cd| cd.get_filename().map(|name| name.to_string()));

        match field_name.as_str() {
            "language" => {
                params.language = read_text_field(&mut field, &field_name).await?;
            }
            "expiration_sec" => {
                let value = read_text_field(&mut field, &field_name).await?;
                if !value.is_empty() {
                    params.expiration_secs = value.parse().map_err(|_| {
                        HandlerError::form_error(format!(
                            "expiration_sec must be a positive integer, got '{}'",
                            value
                        ))
                    })?;
                }
            }
            "audio_files" => {
                let data = read_file_field(&mut field, config.max_file_size).await?;
                let extension = file_name
                    .as_deref()
                    .map(extension_of)
                    .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
                info!(
                    "Received audio file {} ({} bytes)",
                    file_name.as_deref().unwrap_or("<unnamed>"),
                    data.len()
                );
                params.audio_files.push(AudioUpload { data, extension });
            }
            _ => {
                debug!("Skipping unknown form field: {}", field_name);
                while field.next().await.is_some() {}
            }
        }
    }

    if params.language.is_empty() {
        return Err(HandlerError::form_error("Missing required field: language"));
    }
    if params.audio_files.is_empty() {
        return Err(HandlerError::NoAudioFile);
    }

    Ok(params)
}

/// Extension after the last dot of a file name
pub fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

async fn read_text_field(field: &mut Field, field_name: &str) -> Result<String, HandlerError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            HandlerError::form_error(format!("Error reading field {}: {}", field_name, e))
        })?;
        bytes.extend_from_slice(&chunk);
    }
    let value = String::from_utf8(bytes)
        .map_err(|_| HandlerError::form_error(format!("Field {} is not valid UTF-8", field_name)))?;
    Ok(value.trim().to_string())
}

async fn read_file_field(field: &mut Field, max_file_size: usize) -> Result<Vec<u8>, HandlerError> {
    let mut total_size = 0;
    let mut file_data = Vec::new();

    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| {
            HandlerError::form_error(format!("Error processing file upload: {}", e))
        })?;

        total_size += data.len();
        if total_size > max_file_size {
            return Err(HandlerError::FileTooLarge(total_size, max_file_size));
        }
        file_data.extend_from_slice(&data);
    }

    Ok(file_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("meeting.MP3"), "mp3");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), FALLBACK_EXTENSION);
        assert_eq!(extension_of("trailing."), FALLBACK_EXTENSION);
    }
}
