use std::fmt::{Display, Formatter};

/// Handle of a node in a [`ConstraintTree`][crate::constraint::ConstraintTree].
///
/// Ids are allocated in creation order, so they double as a creation timestamp.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConstraintId(u32);

impl ConstraintId {
    /// The root of every tree.
    pub const ROOT: ConstraintId = ConstraintId(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the internal representation of the id.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Return the arena index of the node.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl Display for ConstraintId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_id() {
        let id = ConstraintId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "#7");
        assert!(ConstraintId::ROOT.is_root());
        assert!(ConstraintId::ROOT < id);
    }
}
