use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Failed to parse chart data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tempo map: {0}")]
    InvalidTempoMap(String),

    #[error("Invalid {kind} duration {value} at measure {measure}")]
    InvalidDuration {
        kind: &'static str,
        value: f64,
        measure: i64,
    },

    #[error("Unmatched hold note for key '{key}'")]
    UnmatchedHold { key: String },

    #[error("Unknown note type {0}")]
    UnknownNoteType(u8),

    #[error("Key '{key}' is not present in the keyboard layout")]
    UnsupportedKey { key: String },
}
