//! Memoized uid → user name lookups.

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::reader::OsReader;

/// Caches successful user database lookups for the lifetime of a registry.
///
/// Misses are not cached, so a name that becomes resolvable later (or a
/// transient read failure) is picked up on the next lookup.
#[derive(Debug, Clone, Default)]
pub struct UidNameCache {
    names: HashMap<u32, String>,
}

impl UidNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `uid` to a user name, or an empty string if it is unknown.
    ///
    /// Negative uids never reach the user database.
    pub fn lookup(&mut self, uid: i32, reader: &dyn OsReader) -> String {
        let uid = match u32::try_from(uid) {
            Ok(uid) => uid,
            Err(_) => return String::new(),
        };

        if let Some(name) = self.names.get(&uid) {
            return name.clone();
        }

        let name = reader.user_name(uid);
        if name.is_empty() {
            debug!("No user name found for uid {}", uid);
        } else {
            self.names.insert(uid, name.clone());
        }
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
