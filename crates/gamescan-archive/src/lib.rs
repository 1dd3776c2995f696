//! Codec boundary for compressed game file artifacts.
//!
//! The repair pipeline only needs two questions answered about a downloaded
//! artifact: is it compressed, and what does it decompress to. [`Codec`]
//! captures that; [`PassthroughCodec`] and [`GzipCodec`] are the shipped
//! adapters, and a game's own archive format plugs in behind the same trait.

pub use codec::{Codec, PassthroughCodec};
#[cfg(feature = "gzip")]
pub use codec::GzipCodec;
pub use detect::{Compression, detect_format, detect_from_file};
pub use error::{Error, Result};

mod codec;
mod detect;
mod error;
