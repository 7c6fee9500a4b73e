use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const MENU_BAR_MAX_LEN: usize = 50;

/// Snapshot of what is currently playing, as reported by the media tool.
///
/// Every field is optional because the tool omits whatever the source
/// application does not expose. Equality is structural over every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
    #[serde(default, alias = "isPlaying", skip_serializing_if = "Option::is_none")]
    pub playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_music_app: Option<bool>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_number: Option<i64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub queue_index: Option<i64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_queue_count: Option<i64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub process_identifier: Option<i64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub unique_identifier: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_item_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_data: Option<String>,
}

/// Accepts integers and integral floats (`3` and `3.0`), rejects `3.5`.
fn whole_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(n) = number.as_i64() {
        return Ok(Some(n));
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        _ => Err(D::Error::custom(format!("expected a whole number, got {number}"))),
    }
}

impl MediaState {
    /// Nothing playing (or unknown).
    pub const EMPTY: MediaState = MediaState {
        title: None,
        artist: None,
        album: None,
        genre: None,
        composer: None,
        duration: None,
        elapsed_time: None,
        playback_rate: None,
        playing: None,
        is_music_app: None,
        track_number: None,
        queue_index: None,
        total_queue_count: None,
        process_identifier: None,
        unique_identifier: None,
        bundle_identifier: None,
        content_item_identifier: None,
        media_type: None,
        artwork_mime_type: None,
        timestamp: None,
        artwork_data: None,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn is_playing(&self) -> bool {
        self.playing.unwrap_or(false)
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }

    pub fn display_artist(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown Artist")
    }

    pub fn display_album(&self) -> &str {
        self.album.as_deref().unwrap_or("Unknown Album")
    }

    pub fn menu_bar_text(&self) -> String {
        format!("{} - {}", self.display_artist(), self.display_title())
    }

    pub fn truncated_menu_bar_text(&self) -> String {
        let text = self.menu_bar_text();
        if text.chars().count() > MENU_BAR_MAX_LEN {
            let head: String = text.chars().take(MENU_BAR_MAX_LEN - 3).collect();
            format!("{head}...")
        } else {
            text
        }
    }

    pub fn formatted_duration(&self) -> String {
        format_seconds(self.duration)
    }

    pub fn formatted_elapsed_time(&self) -> String {
        format_seconds(self.elapsed_time)
    }

    /// Fraction of the track already played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match (self.duration, self.elapsed_time) {
            (Some(duration), Some(elapsed)) if duration > 0.0 => {
                (elapsed / duration).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn has_artwork(&self) -> bool {
        self.artwork_data.as_deref().is_some_and(|d| !d.is_empty())
    }
}

fn format_seconds(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "0:00".to_string();
    };
    // Saturating cast: negative and NaN become 0.
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Observable state of the polling service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub current_state: MediaState,
    /// When an observable field last changed.
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped once per emitted [`StatusEvent`].
    pub revision: u64,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            is_loading: false,
            last_error: None,
            current_state: MediaState::EMPTY,
            updated_at: None,
            revision: 0,
        }
    }
}

impl ServiceStatus {
    pub fn has_valid_media(&self) -> bool {
        self.current_state.title.is_some() && self.current_state.is_playing()
    }

    pub fn status_text(&self) -> String {
        if self.is_loading {
            "Loading...".to_string()
        } else if let Some(error) = &self.last_error {
            format!("Error: {error}")
        } else if self.has_valid_media() {
            self.current_state.truncated_menu_bar_text()
        } else {
            "No Media Playing".to_string()
        }
    }
}

/// Change notification delivered to observers of the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusEvent {
    Loading(bool),
    Updated(MediaState),
    Failed(String),
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusEvent::Loading(true) => write!(f, "loading"),
            StatusEvent::Loading(false) => write!(f, "loaded"),
            StatusEvent::Updated(state) if state.is_empty() => write!(f, "no media playing"),
            StatusEvent::Updated(state) => {
                let marker = if state.is_playing() { "playing" } else { "paused" };
                write!(
                    f,
                    "{marker}: {} [{}/{}]",
                    state.menu_bar_text(),
                    state.formatted_elapsed_time(),
                    state.formatted_duration()
                )
            }
            StatusEvent::Failed(message) => write!(f, "error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> MediaState {
        MediaState {
            title: Some("Wenn ich tot bin, fang ich wieder an".to_string()),
            artist: Some("Kraftklub".to_string()),
            duration: Some(215.0),
            elapsed_time: Some(65.4),
            playing: Some(true),
            ..MediaState::EMPTY
        }
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(MediaState::EMPTY.is_empty());
        assert_eq!(MediaState::default(), MediaState::EMPTY);
        assert!(!MediaState::EMPTY.is_playing());
        assert!(!track().is_empty());
    }

    #[test]
    fn test_equality_covers_every_field() {
        let a = track();
        let mut b = track();
        assert_eq!(a, b);

        b.elapsed_time = Some(66.0);
        assert_ne!(a, b);

        let mut c = track();
        c.is_music_app = Some(false);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_fallbacks() {
        let state = MediaState::EMPTY;
        assert_eq!(state.display_title(), "Unknown Title");
        assert_eq!(state.display_artist(), "Unknown Artist");
        assert_eq!(state.display_album(), "Unknown Album");
        assert_eq!(state.formatted_duration(), "0:00");
        assert_eq!(state.progress(), 0.0);
        assert!(!state.has_artwork());
    }

    #[test]
    fn test_formatting() {
        let state = track();
        assert_eq!(state.formatted_duration(), "3:35");
        assert_eq!(state.formatted_elapsed_time(), "1:05");
        assert!((state.progress() - 65.4 / 215.0).abs() < f64::EPSILON);

        let over = MediaState {
            duration: Some(10.0),
            elapsed_time: Some(12.0),
            ..MediaState::EMPTY
        };
        assert_eq!(over.progress(), 1.0);

        let negative = MediaState {
            duration: Some(-5.0),
            ..MediaState::EMPTY
        };
        assert_eq!(negative.formatted_duration(), "0:00");
        assert_eq!(negative.progress(), 0.0);
    }

    #[test]
    fn test_truncated_menu_bar_text() {
        assert_eq!(
            track().truncated_menu_bar_text(),
            "Kraftklub - Wenn ich tot bin, fang ich wieder an"
        );

        let live = MediaState {
            title: Some("Wenn ich tot bin, fang ich wieder an (Live in Chemnitz)".to_string()),
            ..track()
        };
        let text = live.truncated_menu_bar_text();
        assert_eq!(text.chars().count(), 50);
        assert!(text.starts_with("Kraftklub - Wenn ich tot bin"));
        assert!(text.ends_with("..."));

        let short = MediaState {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            ..MediaState::EMPTY
        };
        assert_eq!(short.truncated_menu_bar_text(), "Band - Song");
    }

    #[test]
    fn test_status_text() {
        let mut status = ServiceStatus::default();
        assert_eq!(status.status_text(), "No Media Playing");

        status.is_loading = true;
        assert_eq!(status.status_text(), "Loading...");

        status.is_loading = false;
        status.last_error = Some("boom".to_string());
        assert_eq!(status.status_text(), "Error: boom");

        status.last_error = None;
        status.current_state = MediaState {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            playing: Some(true),
            ..MediaState::EMPTY
        };
        assert!(status.has_valid_media());
        assert_eq!(status.status_text(), "Band - Song");

        status.current_state.playing = Some(false);
        assert_eq!(status.status_text(), "No Media Playing");
    }

    #[test]
    fn test_event_display() {
        assert_eq!(StatusEvent::Loading(true).to_string(), "loading");
        assert_eq!(
            StatusEvent::Updated(MediaState::EMPTY).to_string(),
            "no media playing"
        );
        assert_eq!(
            StatusEvent::Failed("device locked".to_string()).to_string(),
            "error: device locked"
        );
        assert_eq!(
            StatusEvent::Updated(track()).to_string(),
            "playing: Kraftklub - Wenn ich tot bin, fang ich wieder an [1:05/3:35]"
        );
    }
}
