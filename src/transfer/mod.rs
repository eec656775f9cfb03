// Transfer list data model.
//
// A transfer list is the textual manifest that ships next to a
// `*.new.dat` blob in block-based OTA packages:
//
//   - `parser`   — line-oriented parser producing a `TransferList`
//   - `rangeset` — `<count>,<s1>,<e1>,...` token decoding
//
// The list is immutable once parsed. The only check that needs the whole
// command sequence (declared total vs. highest referenced block) lives here
// on `TransferList::validate`.

pub mod parser;
pub mod rangeset;

use std::fmt;

pub use parser::{ParseError, parse_transfer_list, parse_transfer_list_file};
pub use rangeset::parse_rangeset;

// ---------------------------------------------------------------------------
// Format version
// ---------------------------------------------------------------------------

/// Transfer list format version (first header line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVersion {
    V1,
    V2,
    V3,
    V4,
    /// Unrecognised version. Still processed with the v2+ header layout
    /// when `>= 2`.
    Unknown(u32),
}

impl TransferVersion {
    /// Numeric value as written in the file.
    pub fn number(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
            Self::Unknown(n) => n,
        }
    }

    /// Android release that introduced this version, if known.
    pub fn android_release(self) -> Option<&'static str> {
        match self {
            Self::V1 => Some("Android 5.0"),
            Self::V2 => Some("Android 5.1"),
            Self::V3 => Some("Android 6.x"),
            Self::V4 => Some("Android 7.x or above"),
            Self::Unknown(_) => None,
        }
    }

    /// Versions 2 and later carry two extra stash header lines.
    pub fn has_stash_header(self) -> bool {
        self.number() >= 2
    }
}

impl From<u32> for TransferVersion {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::V1,
            2 => Self::V2,
            3 => Self::V3,
            4 => Self::V4,
            n => Self::Unknown(n),
        }
    }
}

impl fmt::Display for TransferVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.android_release() {
            Some(release) => write!(f, "{release} detected!"),
            None => write!(f, "Unknown Android version ({})!", self.number()),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and ranges
// ---------------------------------------------------------------------------

/// The closed set of commands a transfer list may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Erase,
    New,
    Zero,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [Self::Erase, Self::New, Self::Zero];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Erase => "erase",
            Self::New => "new",
            Self::Zero => "zero",
        }
    }

    /// Look up a command by its exact (case-sensitive) name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open block range `[start, end)`. `end > start` always holds for
/// ranges produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of blocks covered.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One line of the command section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub ranges: Vec<BlockRange>,
}

impl Command {
    /// Total blocks covered by all ranges of this command, or `None` if
    /// the count does not fit in a `u64`.
    pub fn block_count(&self) -> Option<u64> {
        self.ranges
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.len()))
    }
}

// ---------------------------------------------------------------------------
// TransferList
// ---------------------------------------------------------------------------

/// Declared total blocks disagree with the highest block actually referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "transfer list declares {declared} total blocks but its ranges end at block {computed}"
)]
pub struct ConsistencyError {
    pub declared: u64,
    pub computed: u64,
}

/// A fully parsed transfer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferList {
    pub version: TransferVersion,
    /// Total block count from the second header line.
    pub declared_total_blocks: u64,
    /// Raw stash header lines (version >= 2 only), kept verbatim.
    pub stash_header: Option<[String; 2]>,
    pub commands: Vec<Command>,
}

impl TransferList {
    /// Highest exclusive end block across every range of every command.
    ///
    /// Erase and zero ranges count toward the image extent just like new
    /// ones. Returns 0 for a list without ranges.
    pub fn max_block(&self) -> u64 {
        self.ranges().map(|(_, r)| r.end).max().unwrap_or(0)
    }

    /// Number of blocks the "new" commands consume from the data blob.
    ///
    /// Ranges may overlap, so the total can exceed `max_block()`; `None`
    /// means it overflowed a `u64`.
    pub fn new_blocks(&self) -> Option<u64> {
        self.commands
            .iter()
            .filter(|c| c.kind == CommandKind::New)
            .try_fold(0u64, |acc, c| acc.checked_add(c.block_count()?))
    }

    /// Iterate all ranges in file order, tagged with their command kind.
    pub fn ranges(&self) -> impl Iterator<Item = (CommandKind, &BlockRange)> {
        self.commands
            .iter()
            .flat_map(|c| c.ranges.iter().map(move |r| (c.kind, r)))
    }

    /// Check that the declared total matches the computed maximum block.
    pub fn validate(&self) -> Result<u64, ConsistencyError> {
        let computed = self.max_block();
        if computed != self.declared_total_blocks {
            return Err(ConsistencyError {
                declared: self.declared_total_blocks,
                computed,
            });
        }
        Ok(computed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
