// Image builder: applies a parsed transfer list to a new-data blob.
//
// For every "new" range, blocks are read sequentially from the blob and
// written at `start * BLOCK_SIZE` in the output. "erase" and "zero" ranges
// are never written; the output is left sparse there and reads back as
// zeros. Once all commands ran, the output is grown (never shrunk) to
// exactly `max_block * BLOCK_SIZE` bytes.
//
// The blob cursor is never rewound: ranges consume it strictly in file
// order, which is the order the blob was produced in.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{debug, info};

use crate::transfer::{BlockRange, CommandKind, ConsistencyError, TransferList};

/// Fixed block size of the transfer list format.
pub const BLOCK_SIZE: usize = 4096;

const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

// ---------------------------------------------------------------------------
// Build error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The blob ran out of data while copying `block` (absolute image block).
    #[error("new data ran out at blob offset {blob_offset} while copying block {block}")]
    BlobExhausted { block: u64, blob_offset: u64 },
    #[error("block {block} is beyond the addressable image size")]
    OffsetOverflow { block: u64 },
    #[error("\"new\" ranges need more data than a 64-bit size can hold")]
    NewDataOverflow,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `ImageBuilder::build()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Blocks copied from the blob.
    pub new_blocks: u64,
    /// "new" ranges processed.
    pub ranges_copied: u64,
    /// Commands skipped ("erase" and "zero").
    pub skipped_commands: u64,
    /// Final image size in bytes.
    pub image_size: u64,
}

// ---------------------------------------------------------------------------
// ImageBuilder
// ---------------------------------------------------------------------------

/// Copies "new" blocks from a data blob into an output image.
pub struct ImageBuilder<R: Read> {
    data: R,
    /// Bytes consumed from the blob so far.
    blob_offset: u64,
    /// Reusable single-block copy buffer.
    block_buf: Vec<u8>,
}

impl<R: Read> ImageBuilder<R> {
    pub fn new(data: R) -> Self {
        Self {
            data,
            blob_offset: 0,
            block_buf: vec![0u8; BLOCK_SIZE],
        }
    }

    /// Bytes read from the data blob so far.
    pub fn blob_offset(&self) -> u64 {
        self.blob_offset
    }

    /// Apply `list` to `out`.
    ///
    /// The declared total block count is checked first; nothing is read or
    /// written if it disagrees with the ranges.
    pub fn build<W: Write + Seek>(
        &mut self,
        list: &TransferList,
        out: &mut W,
    ) -> Result<BuildStats, BuildError> {
        let max_block = list.validate()?;
        let image_size = block_offset(max_block)?;

        let mut stats = BuildStats {
            image_size,
            ..Default::default()
        };

        for command in &list.commands {
            if command.kind != CommandKind::New {
                info!("Skipping command {}...", command.kind);
                stats.skipped_commands += 1;
                continue;
            }
            for range in &command.ranges {
                info!(
                    "Copying {} blocks into position {}...",
                    range.len(),
                    range.start
                );
                self.copy_range(range, out)?;
                stats.ranges_copied += 1;
                stats.new_blocks += range.len();
            }
        }

        grow_to(out, image_size)?;
        out.flush()?;
        Ok(stats)
    }

    fn copy_range<W: Write + Seek>(
        &mut self,
        range: &BlockRange,
        out: &mut W,
    ) -> Result<(), BuildError> {
        out.seek(SeekFrom::Start(block_offset(range.start)?))?;
        for block in range.start..range.end {
            match self.data.read_exact(&mut self.block_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(BuildError::BlobExhausted {
                        block,
                        blob_offset: self.blob_offset,
                    });
                }
                Err(e) => return Err(e.into()),
            }
            out.write_all(&self.block_buf)?;
            self.blob_offset += BLOCK_SIZE_U64;
        }
        Ok(())
    }
}

/// Byte offset of `block`, checked against `u64` overflow.
fn block_offset(block: u64) -> Result<u64, BuildError> {
    block
        .checked_mul(BLOCK_SIZE_U64)
        .ok_or(BuildError::OffsetOverflow { block })
}

/// Extend `out` to `size` bytes by writing a single zero byte at the end.
/// Outputs already at least `size` bytes long are left alone.
fn grow_to<W: Write + Seek>(out: &mut W, size: u64) -> io::Result<()> {
    let current = out.seek(SeekFrom::End(0))?;
    if current < size {
        debug!("extending image from {current} to {size} bytes");
        out.seek(SeekFrom::Start(size - 1))?;
        out.write_all(&[0])?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
