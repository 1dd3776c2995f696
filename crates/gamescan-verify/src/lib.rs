//! Integrity checks for game files.
//!
//! Files are described by a size and a CRC-32. [`quick_check`] compares the
//! size only and is cheap enough to run over a whole install; [`full_check`]
//! and [`ensure_valid`] add a streamed checksum pass with throttled progress
//! and cooperative cancellation.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use gamescan_verify::{Crc32Hasher, VerifiedReader};
//!
//! let mut reader = VerifiedReader::new(&b"123456789"[..], Crc32Hasher::new());
//! let mut sink = Vec::new();
//! reader.read_to_end(&mut sink).unwrap();
//! assert_eq!(reader.into_hasher().value(), 0xCBF4_3926);
//! ```

pub use self::check::{BLOCK_SIZE, ProgressFn, checksum, ensure_valid, full_check, quick_check};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{Crc32Hasher, Hasher};
pub use self::reader::VerifiedReader;

mod check;
mod error;
mod hasher;
mod reader;
