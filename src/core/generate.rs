//! # Generate
//!
//! Generate random identifiers for sessions and protocol messages.

use uuid::Uuid;

/// Generates a session identifier.
///
/// Session identifiers are version 4 UUIDs, giving 122 random bits. Live
/// sessions are keyed by this value so it must not collide within the
/// session expiry window.
#[must_use]
pub fn session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates an identifier for an authorization request message.
#[must_use]
pub fn message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a thread identifier used to correlate a request with its
/// response.
#[must_use]
pub fn thread_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn session_ids_are_distinct() {
        let ids: HashSet<String> = (0..1_000).map(|_| session_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn session_id_is_url_safe() {
        let id = session_id();
        assert_eq!(id.len(), 36);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }
}
