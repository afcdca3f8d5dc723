use crate::models::window::Pid;
use serde::Serialize;
use std::path::PathBuf;

/// Application resolved from a Dock icon hit test.
///
/// Built fresh for every hit test; the running process set changes too often
/// for a cached identity to be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppIdentity {
    /// Bundle identifier (e.g. `com.apple.Safari`)
    pub bundle_id: Option<String>,
    /// Display name as shown by the Dock
    pub name: String,
    /// Location of the application bundle on disk
    pub bundle_path: Option<PathBuf>,
    pub pid: Option<Pid>,
    pub is_running: bool,
}

impl AppIdentity {
    /// Whether two identities refer to the same application. Process ids win
    /// when both sides have one; otherwise bundle identifiers, then names.
    pub fn same_app(&self, other: &AppIdentity) -> bool {
        if let (Some(a), Some(b)) = (self.pid, other.pid) {
            return a == b;
        }
        match (&self.bundle_id, &other.bundle_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }

    /// True when the identity is listed in `excluded` (bundle ids or names).
    pub fn is_excluded_by<'a, I>(&self, excluded: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        excluded.into_iter().any(|entry| {
            self.bundle_id.as_deref() == Some(entry.as_str()) || self.name == *entry
        })
    }
}
