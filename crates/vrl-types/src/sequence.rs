use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Position of an entry in the ledger.
///
/// A composite of block height and intra-block index. Ordering is
/// `height` → `index` (total order), which is exactly ledger inclusion order.
/// [`Sequence::GENESIS`] never names a real entry: ledgers start at height 1,
/// so a cursor at genesis means "nothing scanned yet".
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Sequence {
    /// Block height (1-based for real entries).
    pub height: u64,
    /// Index of the entry within its block.
    pub index: u32,
}

impl Sequence {
    /// The position before every entry.
    pub const GENESIS: Self = Self {
        height: 0,
        index: 0,
    };

    pub const fn new(height: u64, index: u32) -> Self {
        Self { height, index }
    }

    /// Returns `true` if this is the genesis position.
    pub fn is_genesis(&self) -> bool {
        *self == Self::GENESIS
    }

    /// The smallest sequence strictly after this one.
    ///
    /// Used to resume a scan from `cursor + 1`; the returned position need
    /// not name an existing entry.
    pub fn successor(&self) -> Self {
        match self.index.checked_add(1) {
            Some(index) => Self {
                height: self.height,
                index,
            },
            None => Self {
                height: self.height + 1,
                index: 0,
            },
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence({}:{})", self.height, self.index)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.height, self.index)
    }
}

impl FromStr for Sequence {
    type Err = TypeError;

    /// Parse `height:index` (or a bare `height`, meaning index 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidSequence(s.to_string());
        let (height, index) = match s.split_once(':') {
            Some((h, i)) => (h, i),
            None => (s, "0"),
        };
        Ok(Self {
            height: height.trim().parse().map_err(|_| invalid())?,
            index: index.trim().parse().map_err(|_| invalid())?,
        })
    }
}
