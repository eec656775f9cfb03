//! sdat2img: rebuild raw Android block images from sparse transfer lists.
//!
//! Block-based OTA packages ship a partition as two files: a textual
//! `*.transfer.list` and a `*.new.dat` blob holding only the blocks the
//! list marks as "new". This crate turns the pair back into a raw image.
//!
//! The crate provides:
//! - Transfer list parsing and validation (`transfer`)
//! - The block copy / resize engine (`image`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! let stats = sdat2img::io::convert_files(
//!     Path::new("system.transfer.list"),
//!     Path::new("system.new.dat"),
//!     Path::new("system.img"),
//! )
//! .unwrap();
//! println!("wrote {} bytes", stats.image_size);
//! ```

pub mod image;
pub mod io;
pub mod transfer;

#[cfg(feature = "cli")]
pub mod cli;
