//! Collision-free entry naming.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::zip::MAX_FIELD_LEN;

/// Prepended to the base name until it no longer collides.
pub const RENAME_TOKEN: &str = "New_";

/// Entry names taken in the archive being built.
///
/// Lives for one mutation: seeded with the entries copied from the old
/// archive, then extended by every name [`resolve`] hands out.
#[derive(Debug, Default, Clone)]
pub struct UsedNames {
    names: HashSet<String>,
}

impl UsedNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as taken. Returns false if it already was.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for UsedNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Pick a name for `candidate` that is not in `used`, and mark it taken.
///
/// `docs/a.txt` becomes `docs/New_a.txt`, then `docs/New_New_a.txt`, and so
/// on; the directory part never changes.
pub fn resolve(candidate: &str, used: &mut UsedNames) -> Result<String> {
    let (prefix, base) = match candidate.rfind('/') {
        Some(i) => candidate.split_at(i + 1),
        None => ("", candidate),
    };

    let mut name = candidate.to_string();
    let mut renamed_base = base.to_string();
    // Each collision hits a different member of `used`
    let mut attempts = used.len() + 1;

    while used.contains(&name) {
        attempts -= 1;
        if attempts == 0 || name.len() + RENAME_TOKEN.len() > MAX_FIELD_LEN {
            return Err(Error::NamingExhausted {
                name: candidate.to_string(),
            });
        }
        renamed_base.insert_str(0, RENAME_TOKEN);
        name = format!("{prefix}{renamed_base}");
    }

    used.insert(name.clone());
    Ok(name)
}
