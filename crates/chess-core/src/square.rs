//! Board coordinates in the 1-based (file, rank) form used on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shakmaty::{File, Rank};

use crate::rules::RulesError;

/// A (file, rank) pair, both in 1..=8. `a1` is (1, 1), `h8` is (8, 8).
///
/// Ordering is file-major, then rank, which gives a stable iteration order
/// for full-board diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Result<Self, RulesError> {
        if !(1..=8).contains(&file) || !(1..=8).contains(&rank) {
            return Err(RulesError::InvalidSquare(format!("({file}, {rank})")));
        }
        Ok(Self { file, rank })
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    /// All 64 squares in file-major order.
    pub fn all() -> impl Iterator<Item = Square> {
        (1..=8u8).flat_map(|file| (1..=8u8).map(move |rank| Square { file, rank }))
    }

    pub(crate) fn to_shakmaty(self) -> shakmaty::Square {
        // shakmaty Square: file + rank * 8, where file=0..7 (a..h), rank=0..7 (1..8)
        shakmaty::Square::from_coords(
            File::new(u32::from(self.file - 1)),
            Rank::new(u32::from(self.rank - 1)),
        )
    }

}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file - 1) as char, self.rank)
    }
}

impl FromStr for Square {
    type Err = RulesError;

    /// Parse two-character algebraic notation, e.g. `"e4"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(RulesError::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(RulesError::InvalidSquare(s.to_string()));
        }
        Ok(Self {
            file: file - b'a' + 1,
            rank: rank - b'0',
        })
    }
}

impl Serialize for Square {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
