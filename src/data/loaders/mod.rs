//! Built-in raster readers.
//!
//! This module contains implementations of the `RasterReader` trait
//! for the supported on-disk formats.

mod envi;
mod npy_loader;

pub use envi::{EnviDataType, EnviHeader, EnviReader, Interleave};
pub use npy_loader::NpyReader;
