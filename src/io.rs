// File-level driver for image reconstruction.
//
// Provides `convert_files()` and `check_files()` convenience functions that
// run the whole pipeline against paths: parse the transfer list, validate
// it, pre-check the new-data blob length, then (for conversion) build the
// image into a freshly created output file with buffered I/O.
//
// An existing output file is never opened, truncated or overwritten, and is
// reported before the new-data blob is looked at.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::image::{BLOCK_SIZE, BuildError, BuildStats, ImageBuilder};
use crate::transfer::{
    CommandKind, ConsistencyError, ParseError, TransferList, parse_transfer_list_file,
};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `convert_files()` and `check_files()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Transfer list format version.
    pub version: u32,
    /// Total blocks declared by the transfer list.
    pub declared_total_blocks: u64,
    /// New-data blob size in bytes.
    pub blob_size: u64,
    /// Blocks copied (or, for a check, to be copied) from the blob.
    pub new_blocks: u64,
    /// "new" ranges processed.
    pub ranges_copied: u64,
    /// "erase"/"zero" commands skipped.
    pub skipped_commands: u64,
    /// Output image size in bytes.
    pub image_size: u64,
}

impl ConvertStats {
    fn new(list: &TransferList, blob_size: u64, build: BuildStats) -> Self {
        Self {
            version: list.version.number(),
            declared_total_blocks: list.declared_total_blocks,
            blob_size,
            new_blocks: build.new_blocks,
            ranges_copied: build.ranges_copied,
            skipped_commands: build.skipped_commands,
            image_size: build.image_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(
        "the output file '{}' already exists; remove it, rename it, or choose a different file name",
        .0.display()
    )]
    OutputExists(PathBuf),
    #[error("new data is {available} bytes but the transfer list needs {needed}")]
    BlobTooShort { needed: u64, available: u64 },
    #[error("could not open {what} {}: {source}", path.display())]
    Open {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Shared preparation
// ---------------------------------------------------------------------------

struct Prepared {
    list: TransferList,
    blob: File,
    blob_size: u64,
}

/// Parse the transfer list and check it against its own declared total.
fn load_list(transfer_list: &Path) -> Result<TransferList, ConvertError> {
    let list = parse_transfer_list_file(transfer_list)?;
    info!("{}", list.version);
    list.validate()?;
    Ok(list)
}

/// Bytes of new data the "new" ranges consume.
fn needed_bytes(list: &TransferList) -> Result<u64, BuildError> {
    list.new_blocks()
        .and_then(|blocks| blocks.checked_mul(BLOCK_SIZE as u64))
        .ok_or(BuildError::NewDataOverflow)
}

/// Open the blob, checking that it holds at least as many bytes as the
/// "new" ranges consume.
fn open_blob(list: TransferList, new_data: &Path) -> Result<Prepared, ConvertError> {
    let open_err = |source| ConvertError::Open {
        what: "new data",
        path: new_data.to_path_buf(),
        source,
    };
    let blob = File::open(new_data).map_err(open_err)?;
    let blob_size = blob.metadata().map_err(open_err)?.len();

    let needed = needed_bytes(&list)?;
    if blob_size < needed {
        return Err(ConvertError::BlobTooShort {
            needed,
            available: blob_size,
        });
    }
    if blob_size > needed {
        warn!(
            "new data has {} trailing bytes not referenced by the transfer list",
            blob_size - needed
        );
    }

    Ok(Prepared {
        list,
        blob,
        blob_size,
    })
}

// ---------------------------------------------------------------------------
// convert_files
// ---------------------------------------------------------------------------

/// Rebuild the raw image described by `transfer_list` + `new_data` into
/// `output`, which must not exist yet.
///
/// On failure after the output was created, the partial file is left in
/// place for the caller to remove.
pub fn convert_files(
    transfer_list: &Path,
    new_data: &Path,
    output: &Path,
) -> Result<ConvertStats, ConvertError> {
    let list = load_list(transfer_list)?;
    if output.exists() {
        return Err(ConvertError::OutputExists(output.to_path_buf()));
    }
    let Prepared {
        list,
        blob,
        blob_size,
    } = open_blob(list, new_data)?;

    let out_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => ConvertError::OutputExists(output.to_path_buf()),
            _ => ConvertError::Open {
                what: "output image",
                path: output.to_path_buf(),
                source,
            },
        })?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, out_file);
    let mut builder = ImageBuilder::new(BufReader::with_capacity(BUF_SIZE, blob));
    let build = builder.build(&list, &mut writer)?;

    info!("Done! Output image: {}", output.display());
    Ok(ConvertStats::new(&list, blob_size, build))
}

// ---------------------------------------------------------------------------
// check_files
// ---------------------------------------------------------------------------

/// Validate the inputs without writing anything.
///
/// Returns the stats a conversion of the same inputs would report.
pub fn check_files(transfer_list: &Path, new_data: &Path) -> Result<ConvertStats, ConvertError> {
    let Prepared {
        list, blob_size, ..
    } = open_blob(load_list(transfer_list)?, new_data)?;

    let max_block = list.max_block();
    let image_size = max_block
        .checked_mul(BLOCK_SIZE as u64)
        .ok_or(BuildError::OffsetOverflow { block: max_block })?;

    let mut build = BuildStats {
        image_size,
        new_blocks: list.new_blocks().ok_or(BuildError::NewDataOverflow)?,
        ..Default::default()
    };
    for command in &list.commands {
        if command.kind == CommandKind::New {
            build.ranges_copied += command.ranges.len() as u64;
        } else {
            build.skipped_commands += 1;
        }
    }

    info!("Transfer list and new data are consistent");
    Ok(ConvertStats::new(&list, blob_size, build))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
