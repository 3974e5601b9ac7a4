// File utilities for Whisper Queue workers
//
// Each claimed job gets its own folder under the worker temp directory holding
// the decoded audio. The folder is removed once the job is finished.

use log::{error, info};
use std::io;
use std::path::{Path, PathBuf};

/// Folder holding the files of one job
pub fn job_folder(temp_dir: &Path, job_id: &str) -> PathBuf {
    temp_dir.join(job_id)
}

/// Write the audio of a job to `<temp_dir>/<job_id>/audio.<extension>`
///
/// # Returns
///
/// * The path of the written audio file
///
/// # Errors
///
/// Returns an IO error if the folder cannot be created or the file cannot be written
pub async fn save_job_audio(
    temp_dir: &Path,
    job_id: &str,
    extension: &str,
    data: &[u8],
) -> io::Result<PathBuf> {
    let folder = job_folder(temp_dir, job_id);
    tokio::fs::create_dir_all(&folder).await?;

    let audio_file = folder.join(format!("audio.{}", sanitize_extension(extension)));
    tokio::fs::write(&audio_file, data).await?;
    Ok(audio_file)
}

/// Keep only ASCII alphanumerics so an extension can never escape the job folder
pub fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

/// Clean up a folder and its contents
///
/// This function logs errors but doesn't return them to the caller
pub fn cleanup_folder(folder_path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(folder_path) {
        error!("Failed to clean up folder {}: {}", folder_path.display(), e);
    } else {
        info!("Successfully cleaned up folder: {}", folder_path.display());
    }
}

/// Reads a text file into a string
pub async fn read_text_file(path: &Path) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("MP3"), "mp3");
        assert_eq!(sanitize_extension("../../etc"), "etc");
        assert_eq!(sanitize_extension(""), "bin");
        assert_eq!(sanitize_extension("./"), "bin");
    }

    #[tokio::test]
    async fn test_save_and_cleanup_job_audio() {
        let temp_dir = std::env::temp_dir().join(format!("whisper_queue_fu_{}", uuid::Uuid::new_v4()));
        let path = save_job_audio(&temp_dir, "job-1", "wav", b"RIFF").await.unwrap();

        assert_eq!(path, temp_dir.join("job-1").join("audio.wav"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"RIFF");

        cleanup_folder(&job_folder(&temp_dir, "job-1"));
        assert!(!path.exists());
        cleanup_folder(&temp_dir);
    }
}
