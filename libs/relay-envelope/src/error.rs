use thiserror::Error;

/// Envelope codec errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EnvelopeError {
    /// Outbound envelope could not be serialized to JSON
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Inbound payload is not a well-formed envelope
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Inbound `status_code` is not a valid HTTP status
    #[error("Invalid status code in envelope: {0}")]
    InvalidStatus(u16),
}
