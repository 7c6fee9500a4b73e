use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::models::MediaState;

const DATA_URI_PREFIXES: [(&str, &str); 2] = [
    ("data:image/jpeg;base64,", "image/jpeg"),
    ("data:image/png;base64,", "image/png"),
];

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("no artwork available")]
    Missing,
    #[error("invalid artwork data: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artwork {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            _ => "bin",
        }
    }
}

/// Decode the artwork blob of a snapshot, stripping a JPEG/PNG data URI prefix if present.
pub fn decode(state: &MediaState) -> Result<Artwork, ArtworkError> {
    let data = state
        .artwork_data
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or(ArtworkError::Missing)?;

    let (payload, uri_mime) = DATA_URI_PREFIXES
        .iter()
        .find_map(|(prefix, mime)| data.strip_prefix(prefix).map(|rest| (rest, Some(*mime))))
        .unwrap_or((data, None));

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned)?;

    let mime_type = uri_mime
        .map(str::to_string)
        .or_else(|| state.artwork_mime_type.clone())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(Artwork { mime_type, bytes })
}
