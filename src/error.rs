//! Error types for the transcription engine

use thiserror::Error;

/// Errors surfaced by the transcription pipeline
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// E001: Invalid audio format (e.g., more than two channels)
    #[error("E001: Invalid audio format - {0}")]
    InvalidAudioFormat(String),
    /// E002: Unsupported sample rate
    #[error("E002: Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),
    /// E003: Configuration validation failed
    #[error("E003: Configuration validation failed - {0}")]
    ConfigValidationFailed(String),
    /// E004: Audio file I/O error
    #[error("E004: Audio file I/O error - {0}")]
    AudioFileError(String),
    /// E005: Resampling to the working rate failed
    #[error("E005: Resampling failed - {0}")]
    ResampleFailed(String),
    /// E006: Spectral processing error
    #[error("E006: Spectral processing error - {0}")]
    SpectralProcessingError(String),
    /// E007: Input validation error
    #[error("E007: Input validation error - {0}")]
    InputValidationError(String),
    /// E008: MIDI export error
    #[error("E008: MIDI export error - {0}")]
    MidiExportError(String),
    /// E009: Analysis export error
    #[error("E009: Analysis export error - {0}")]
    AnalysisExportError(String),
    /// E010: QA artifact generation error
    #[error("E010: QA artifact generation error - {0}")]
    QaGenerationError(String),
}

impl From<std::io::Error> for TranscriptionError {
    fn from(err: std::io::Error) -> Self {
        TranscriptionError::AudioFileError(format!("File I/O error: {}", err))
    }
}

impl From<hound::Error> for TranscriptionError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => e.into(),
            hound::Error::Unsupported => {
                TranscriptionError::InvalidAudioFormat("unsupported WAV encoding".to_string())
            }
            other => TranscriptionError::AudioFileError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TranscriptionError {
    fn from(err: serde_json::Error) -> Self {
        TranscriptionError::AnalysisExportError(format!("JSON serialization error: {}", err))
    }
}

/// Result type alias for transcription operations
pub type Result<T> = std::result::Result<T, TranscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = TranscriptionError::UnsupportedSampleRate(1000);
        assert_eq!(err.to_string(), "E002: Unsupported sample rate 1000 Hz");

        let err = TranscriptionError::ConfigValidationFailed("overlap must be > 0".to_string());
        assert!(err.to_string().starts_with("E003"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TranscriptionError = io.into();
        assert!(matches!(err, TranscriptionError::AudioFileError(_)));
    }
}
