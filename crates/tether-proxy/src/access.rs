//! Lookup access modes
//!
//! A privileged lookup carries a bitmask of the visibilities it may reach.
//! The legacy lookup constructor is handed [`AccessModes::ALLOWED_MODES`];
//! the modern factory grants the same full access to its target type.

use std::fmt;

use tether_sdk::Visibility;

/// Access mode flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessModes(u8);

impl AccessModes {
    /// Nothing reachable
    pub const NONE: Self = Self(0x00);
    /// Public members
    pub const PUBLIC: Self = Self(0x01);
    /// Private members
    pub const PRIVATE: Self = Self(0x02);
    /// Protected members
    pub const PROTECTED: Self = Self(0x04);
    /// Package-private members
    pub const PACKAGE: Self = Self(0x08);

    /// PRIVATE | PROTECTED | PACKAGE | PUBLIC
    pub const ALLOWED_MODES: Self = Self::PRIVATE
        .union(Self::PROTECTED)
        .union(Self::PACKAGE)
        .union(Self::PUBLIC);

    /// Check if all flags of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of modes
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The flag needed to reach a member of this visibility
    pub const fn required_for(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Public => Self::PUBLIC,
            Visibility::Protected => Self::PROTECTED,
            Visibility::Package => Self::PACKAGE,
            Visibility::Private => Self::PRIVATE,
        }
    }

    /// Whether a member of this visibility is reachable
    pub const fn allows(&self, visibility: Visibility) -> bool {
        self.contains(Self::required_for(visibility))
    }
}

impl fmt::Display for AccessModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            return f.write_str("NONE");
        }
        if *self == Self::ALLOWED_MODES {
            return f.write_str("ALLOWED_MODES");
        }
        let names = [
            (Self::PUBLIC, "PUBLIC"),
            (Self::PRIVATE, "PRIVATE"),
            (Self::PROTECTED, "PROTECTED"),
            (Self::PACKAGE, "PACKAGE"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_modes_cover_everything() {
        let all = AccessModes::ALLOWED_MODES;
        assert!(all.allows(Visibility::Public));
        assert!(all.allows(Visibility::Private));
        assert!(all.allows(Visibility::Protected));
        assert!(all.allows(Visibility::Package));
    }

    #[test]
    fn test_public_only() {
        let modes = AccessModes::PUBLIC;
        assert!(modes.allows(Visibility::Public));
        assert!(!modes.allows(Visibility::Private));
        assert!(!AccessModes::NONE.allows(Visibility::Public));
    }

    #[test]
    fn test_set_operations() {
        let a = AccessModes::PUBLIC.union(AccessModes::PACKAGE);
        assert!(a.contains(AccessModes::PACKAGE));
        assert!(!a.contains(AccessModes::PRIVATE));
        assert!(AccessModes::ALLOWED_MODES.contains(a));
        assert!(a.allows(Visibility::Package));
    }

    #[test]
    fn test_display() {
        assert_eq!(AccessModes::ALLOWED_MODES.to_string(), "ALLOWED_MODES");
        assert_eq!(AccessModes::NONE.to_string(), "NONE");
        assert_eq!(
            AccessModes::PUBLIC.union(AccessModes::PACKAGE).to_string(),
            "PUBLIC|PACKAGE"
        );
    }
}
