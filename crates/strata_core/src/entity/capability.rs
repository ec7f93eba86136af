//! Optional entity capabilities.

use std::fmt;
use std::ops::BitOr;

/// The set of optional behaviours an entity type supports.
///
/// Capabilities combine freely and are declared once per type through
/// [`Entity::capabilities`](crate::Entity::capabilities). Repositories
/// read the set when they are built, not on every call.
///
/// ```
/// use strata_core::Capabilities;
///
/// let caps = Capabilities::VERSIONABLE | Capabilities::EDGEABLE;
/// assert!(caps.contains(Capabilities::VERSIONABLE));
/// assert!(!caps.contains(Capabilities::EMBEDDABLE));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No optional capabilities.
    pub const NONE: Self = Self(0);
    /// Carries a vector embedding and takes part in semantic search.
    pub const EMBEDDABLE: Self = Self(1);
    /// Every save appends a version record.
    pub const VERSIONABLE: Self = Self(1 << 1);
    /// May be the source or target of typed edges.
    pub const EDGEABLE: Self = Self(1 << 2);
    /// Carries an owner identifier.
    pub const OWNABLE: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::EMBEDDABLE, "embeddable"),
        (Self::VERSIONABLE, "versionable"),
        (Self::EDGEABLE, "edgeable"),
        (Self::OWNABLE, "ownable"),
    ];

    /// Returns true if every capability in `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no capability is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capabilities({self})")
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_contains_only_none() {
        assert!(Capabilities::NONE.is_empty());
        assert!(Capabilities::NONE.contains(Capabilities::NONE));
        assert!(!Capabilities::NONE.contains(Capabilities::OWNABLE));
    }

    #[test]
    fn display_lists_names() {
        let caps = Capabilities::EMBEDDABLE | Capabilities::OWNABLE;
        assert_eq!(caps.to_string(), "embeddable+ownable");
        assert_eq!(Capabilities::NONE.to_string(), "none");
    }
}
