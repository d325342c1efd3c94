//! Reconciler configuration.

/// Toggles for the runtime checks on caller contracts.
///
/// Every check is on by default. A disabled check logs a warning and the
/// engine carries on:
///
/// - `check_hook_order`: a hook that changed shape (or a hook past the end of
///   the previous render's list) is re-mounted from its initial state.
/// - `check_duplicate_keys`: the first sibling with a key wins, later ones are
///   treated as new.
/// - `reject_detached_updates`: the update is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub check_hook_order: bool,
    pub check_duplicate_keys: bool,
    pub reject_detached_updates: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            check_hook_order: true,
            check_duplicate_keys: true,
            reject_detached_updates: true,
        }
    }
}

impl ReconcilerConfig {
    /// All checks off. Contract violations only log.
    pub fn relaxed() -> Self {
        Self {
            check_hook_order: false,
            check_duplicate_keys: false,
            reject_detached_updates: false,
        }
    }
}
