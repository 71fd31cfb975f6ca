//! Immutable flag sets over closed enumerations of bit values
//!
//! Each protocol declares its flag bits as an enum implementing [`Flag`];
//! [`FlagSet`] holds a subset of those bits as a scalar mask. Only enumerated
//! bits are representable: unknown bits are silently dropped when decoding a
//! scalar, which is lossy by design rather than an error.

use std::fmt;
use std::marker::PhantomData;

/// A closed enumeration of named flag bits
pub trait Flag: Copy + Eq + 'static {
    /// Every member of the enumeration, in display order
    const ALL: &'static [Self];

    /// The bit value of this member
    fn bits(self) -> u16;

    /// Short display name, e.g. "SYN"
    fn label(self) -> &'static str;
}

/// An immutable set of flags drawn from one enumeration
pub struct FlagSet<F: Flag> {
    mask: u16,
    _marker: PhantomData<F>,
}

impl<F: Flag> FlagSet<F> {
    /// The empty set
    pub fn empty() -> Self {
        FlagSet {
            mask: 0,
            _marker: PhantomData,
        }
    }

    /// Build a set from the given members
    pub fn of(flags: &[F]) -> Self {
        let mut mask = 0;
        for flag in flags {
            mask |= flag.bits();
        }
        FlagSet {
            mask,
            _marker: PhantomData,
        }
    }

    /// A copy of this set with `flag` added
    pub fn with(self, flag: F) -> Self {
        FlagSet {
            mask: self.mask | flag.bits(),
            _marker: PhantomData,
        }
    }

    /// Test membership
    pub fn contains(&self, flag: F) -> bool {
        self.mask & flag.bits() != 0
    }

    /// The bitwise OR of the member values
    pub fn bits(&self) -> u16 {
        self.mask
    }

    /// Reconstruct a set from a scalar, keeping only enumerated bits
    pub fn from_bits(value: u16) -> Self {
        let mut mask = 0;
        for flag in F::ALL {
            if value & flag.bits() != 0 {
                mask |= flag.bits();
            }
        }
        FlagSet {
            mask,
            _marker: PhantomData,
        }
    }

    /// Iterate over the members in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(|f| self.contains(*f))
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

impl<F: Flag> Clone for FlagSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Flag> Copy for FlagSet<F> {}

impl<F: Flag> PartialEq for FlagSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.mask == other.mask
    }
}

impl<F: Flag> Eq for FlagSet<F> {}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        FlagSet::empty()
    }
}

impl<F: Flag> fmt::Display for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let mut first = true;
        for flag in self.iter() {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{}", flag.label())?;
            first = false;
        }
        Ok(())
    }
}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlagSet({})", self)
    }
}
