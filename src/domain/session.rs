//! Session identity model and identifier generation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fixed identifier returned for every client in shared-session demo mode.
///
/// Intentionally collapses identity isolation so multiple browsers observe one
/// cart; never enable outside demos.
pub const SHARED_SESSION_ID: &str = "12345678-1234-1234-1234-123456789123";

/// A per-browser session as established by the session middleware.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub created: DateTime<Utc>,
}

impl SessionRecord {
    /// Mints a new session: a random UUID, or the fixed shared identifier
    /// when `shared` demo mode is on.
    pub fn mint(shared: bool) -> Self {
        let session_id = if shared {
            SHARED_SESSION_ID.to_string()
        } else {
            Uuid::new_v4().to_string()
        };
        Self {
            session_id,
            created: Utc::now(),
        }
    }

    /// Wraps an identifier presented by an existing session cookie.
    pub fn existing(session_id: String) -> Self {
        Self {
            session_id,
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_random_sessions_are_unique() {
        let a = SessionRecord::mint(false);
        let b = SessionRecord::mint(false);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_mint_shared_mode_is_fixed() {
        let a = SessionRecord::mint(true);
        let b = SessionRecord::mint(true);
        assert_eq!(a.session_id, SHARED_SESSION_ID);
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn test_minted_id_is_uuid_shaped() {
        let record = SessionRecord::mint(false);
        assert!(Uuid::parse_str(&record.session_id).is_ok());
    }
}
