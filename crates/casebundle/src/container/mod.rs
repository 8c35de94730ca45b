//! Uncompressed (STORE) ZIP container writer and the CRC32 it depends on.

pub mod crc32;
pub mod zip;

pub use crc32::crc32;
pub use zip::{build, ContainerEntry, ZipBuilder};
