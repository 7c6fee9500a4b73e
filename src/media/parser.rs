use crate::models::MediaState;

use super::MediaError;

const NO_MEDIA_MARKER: &str = "no media";

/// Decode raw media tool output into a snapshot.
///
/// Accepts either a JSON object with (optional, nullable) media fields or a
/// free-text line containing "no media", which maps to [`MediaState::EMPTY`].
pub fn parse(bytes: &[u8]) -> Result<MediaState, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::EmptyResponse);
    }

    match serde_json::from_slice::<MediaState>(bytes) {
        Ok(state) => Ok(state),
        Err(e) if reports_no_media(bytes) => {
            tracing::debug!("Media tool reported no media ({e})");
            Ok(MediaState::EMPTY)
        }
        Err(e) => Err(MediaError::ParseFailed(e.to_string())),
    }
}

fn reports_no_media(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|text| text.trim().to_lowercase().contains(NO_MEDIA_MARKER))
        .unwrap_or(false)
}
