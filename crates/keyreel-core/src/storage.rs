//! Storage-directory resolution for persistable key sessions.
//!
//! Not part of the protocol core proper: the security context is consulted
//! only to compute a persistence path the backing module may use. How keys
//! are actually written there is the module's business.

use std::path::PathBuf;

/// The security context a session was created in.
///
/// Supplies the three facts needed to decide where (and whether) persisted
/// keys may live.
pub trait StorageContext {
    /// Whether the context forbids persistence entirely (e.g. a private
    /// browsing session).
    fn is_ephemeral(&self) -> bool;

    /// The configured root directory for persisted keys, if any.
    fn storage_root(&self) -> Option<PathBuf>;

    /// A filesystem-safe identifier for the context's origin.
    fn origin_identifier(&self) -> String;
}

/// Resolve the storage directory for a context.
///
/// Returns `None` when persistence is disabled: the context is ephemeral or
/// no root is configured. Otherwise the directory is an origin-scoped
/// subdirectory of the root.
pub fn storage_directory(context: &impl StorageContext) -> Option<PathBuf> {
    if context.is_ephemeral() {
        return None;
    }

    let root = context.storage_root()?;
    Some(root.join(context.origin_identifier()))
}
