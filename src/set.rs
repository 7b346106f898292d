//! Plain set value, carried as a union/intersection source for the
//! sorted-set store commands (every member counts as score 1.0) and for
//! wrong-type checks. Only the table encoding lives here; the int-set
//! primitive is an external container this engine does not reimplement.

use crate::dict::Dict;

pub struct Set {
    members: Dict<()>,
}

impl Default for Set {
    fn default() -> Self {
        Self::new()
    }
}

impl Set {
    pub fn new() -> Self {
        Set { members: Dict::new() }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.members.contains(member)
    }

    /// Returns true when the member was not already present.
    pub fn insert(&mut self, member: Vec<u8>) -> bool {
        self.members.insert(member, ()).is_none()
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        self.members.remove(member).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.members.keys()
    }
}
