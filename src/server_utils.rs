use chrono::{DateTime, SecondsFormat, Utc};

pub const DEFAULT_ROOM_ID: &str = "main";
const MAX_ROOM_ID_LEN: usize = 32;

/// Lowercased room id, or `None` when the requested id is unusable. A
/// missing id selects the default room.
pub fn normalize_room_id(raw: Option<&str>) -> Option<String> {
    let Some(value) = raw else {
        return Some(DEFAULT_ROOM_ID.to_string());
    };
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.len() > MAX_ROOM_ID_LEN {
        return None;
    }
    let valid = normalized
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    valid.then_some(normalized)
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
