//! # Graph Limits
//!
//! Hardcoded runtime constants for the Egregore core.
//!
//! Every read is bounded by one of these caps so that no single call can
//! turn into an unbounded scan of the backend.

/// Hard maximum for `list_nodes` / `list_relationships`.
///
/// Callers may ask for fewer, never for more.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Maximum number of hits returned by a substring search.
pub const MAX_SEARCH_RESULTS: usize = 100;

/// Default number of memories returned by recall.
pub const DEFAULT_RECALL_LIMIT: usize = 5;

/// Maximum number of memories a single recall may return.
pub const MAX_RECALL_LIMIT: usize = 100;

/// Relationship label used when the caller does not supply one.
pub const DEFAULT_RELATION_TYPE: &str = "RELATED_TO";

/// Decimal places used when density is rendered for display.
pub const DENSITY_DISPLAY_PLACES: u32 = 4;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for relationship labels.
///
/// Labels longer than this are rejected before touching the backend.
pub const MAX_RELATION_TYPE_LENGTH: usize = 256;

/// Maximum length for memory content (1 MiB).
///
/// Content longer than this is rejected to prevent memory exhaustion from
/// malicious or malformed input.
pub const MAX_CONTENT_LENGTH: usize = 1024 * 1024;

/// Maximum length for a substring search needle.
pub const MAX_NEEDLE_LENGTH: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_cap_never_exceeds_list_cap() {
        assert!(MAX_SEARCH_RESULTS <= MAX_LIST_LIMIT);
    }

    #[test]
    fn default_recall_limit_is_five() {
        assert_eq!(DEFAULT_RECALL_LIMIT, 5);
    }
}
