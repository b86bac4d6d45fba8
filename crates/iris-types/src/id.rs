use std::fmt;

/// Identifier of an API supplied by an external schema collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiId(pub u32);

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api:{}", self.0)
    }
}

/// Index of a top-level command in a capture.
///
/// Bit 62 flags a *derived* command, synthesized for presentation rather
/// than captured from the application. Ordering and equality are on the
/// full 64-bit value, so a derived id sorts after every real id below it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CmdId(u64);

const DERIVED_BIT: u64 = 1 << 62;

impl CmdId {
    /// The reserved "no command" sentinel.
    pub const NO_ID: CmdId = CmdId((1u64 << 63) - 1);

    pub const fn new(value: u64) -> Self {
        CmdId(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The id with the derived flag set.
    pub const fn derived(self) -> Self {
        CmdId(self.0 | DERIVED_BIT)
    }

    /// The id with the derived flag cleared.
    pub const fn real(self) -> Self {
        CmdId(self.0 & !DERIVED_BIT)
    }

    pub const fn is_derived(self) -> bool {
        self.0 & DERIVED_BIT != 0
    }

    /// True for ids that name an actual captured command: not the sentinel
    /// and not derived.
    pub fn is_real(self) -> bool {
        self != Self::NO_ID && !self.is_derived()
    }
}

impl From<u64> for CmdId {
    fn from(value: u64) -> Self {
        CmdId(value)
    }
}

impl fmt::Display for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NO_ID {
            return write!(f, "(NoID)");
        }
        if self.is_derived() {
            return write!(f, "{}*", self.real().0);
        }
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CmdId({})", self)
    }
}
