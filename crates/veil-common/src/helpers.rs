//! Common helper functions for Veil.

/// Maximum session id length in characters.
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Session ids are 1-64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
