//! PKZIP writer restricted to the STORE method.
//!
//! Layout: `[local header + data]*`, `[central directory header]*`, EOCD.
//! Modification time and date are always zero so identical entries always
//! produce identical archives.

use std::collections::HashSet;

use crate::error::ContainerError;

use super::crc32::crc32;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4B50;

const VERSION: u16 = 20;
const METHOD_STORE: u16 = 0;
/// General purpose bit 11: file name is UTF-8.
const FLAG_UTF8: u16 = 1 << 11;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const EOCD_LEN: usize = 22;

/// One file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl ContainerEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Builds a STORE-only ZIP archive from `entries`, preserving their order.
///
/// Every path is validated before any byte is written, so a duplicate or
/// malformed path never yields a partial archive.
pub fn build(entries: &[ContainerEntry]) -> Result<Vec<u8>, ContainerError> {
    validate_entries(entries)?;

    let data_len: usize = entries
        .iter()
        .map(|e| LOCAL_HEADER_LEN + e.path.len() + e.bytes.len())
        .sum();
    let directory_len: usize = entries
        .iter()
        .map(|e| CENTRAL_HEADER_LEN + e.path.len())
        .sum();
    if data_len + directory_len + EOCD_LEN > u32::MAX as usize {
        return Err(ContainerError::TooLarge(format!(
            "{} bytes exceeds the 4 GiB limit of a non-ZIP64 archive",
            data_len + directory_len + EOCD_LEN
        )));
    }

    let mut out = Vec::with_capacity(data_len + directory_len + EOCD_LEN);
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let record = EntryRecord {
            name: entry.path.as_bytes(),
            flags: name_flags(&entry.path),
            crc: crc32(&entry.bytes),
            size: entry.bytes.len() as u32,
            offset: out.len() as u32,
        };

        put_u32(&mut out, LOCAL_HEADER_SIGNATURE);
        put_u16(&mut out, VERSION);
        put_u16(&mut out, record.flags);
        put_u16(&mut out, METHOD_STORE);
        put_u16(&mut out, 0); // mod time
        put_u16(&mut out, 0); // mod date
        put_u32(&mut out, record.crc);
        put_u32(&mut out, record.size); // compressed
        put_u32(&mut out, record.size); // uncompressed
        put_u16(&mut out, record.name.len() as u16);
        put_u16(&mut out, 0); // extra field length
        out.extend_from_slice(record.name);
        out.extend_from_slice(&entry.bytes);

        records.push(record);
    }

    let directory_offset = out.len() as u32;

    for record in &records {
        put_u32(&mut out, CENTRAL_HEADER_SIGNATURE);
        put_u16(&mut out, VERSION); // made by
        put_u16(&mut out, VERSION); // needed to extract
        put_u16(&mut out, record.flags);
        put_u16(&mut out, METHOD_STORE);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u32(&mut out, record.crc);
        put_u32(&mut out, record.size);
        put_u32(&mut out, record.size);
        put_u16(&mut out, record.name.len() as u16);
        put_u16(&mut out, 0); // extra field length
        put_u16(&mut out, 0); // comment length
        put_u16(&mut out, 0); // disk number start
        put_u16(&mut out, 0); // internal attributes
        put_u32(&mut out, 0); // external attributes
        put_u32(&mut out, record.offset);
        out.extend_from_slice(record.name);
    }

    let directory_size = out.len() as u32 - directory_offset;
    let count = records.len() as u16;

    put_u32(&mut out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    put_u16(&mut out, 0); // this disk
    put_u16(&mut out, 0); // disk with central directory
    put_u16(&mut out, count);
    put_u16(&mut out, count);
    put_u32(&mut out, directory_size);
    put_u32(&mut out, directory_offset);
    put_u16(&mut out, 0); // comment length

    Ok(out)
}

struct EntryRecord<'a> {
    name: &'a [u8],
    flags: u16,
    crc: u32,
    size: u32,
    offset: u32,
}

fn validate_entries(entries: &[ContainerEntry]) -> Result<(), ContainerError> {
    if entries.len() > u16::MAX as usize {
        return Err(ContainerError::TooLarge(format!(
            "{} entries exceeds the limit of {}",
            entries.len(),
            u16::MAX
        )));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        validate_path(&entry.path)?;
        if entry.bytes.len() > u32::MAX as usize {
            return Err(ContainerError::TooLarge(format!(
                "entry '{}' is larger than 4 GiB",
                entry.path
            )));
        }
        if !seen.insert(entry.path.as_str()) {
            return Err(ContainerError::DuplicatePath {
                path: entry.path.clone(),
            });
        }
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), ContainerError> {
    let invalid = |reason| ContainerError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.len() > u16::MAX as usize {
        return Err(invalid("path is too long"));
    }
    if path.starts_with('/') {
        return Err(invalid("path must be relative"));
    }
    if path.contains('\\') {
        return Err(invalid("path must use '/' separators"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid("path must not contain '..' segments"));
    }
    Ok(())
}

fn name_flags(path: &str) -> u16 {
    if path.is_ascii() {
        0
    } else {
        FLAG_UTF8
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Accumulates entries and rejects a duplicate path as soon as it is added.
#[derive(Debug, Default)]
pub struct ZipBuilder {
    entries: Vec<ContainerEntry>,
    paths: HashSet<String>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, ContainerError> {
        let path = path.into();
        validate_path(&path)?;
        if !self.paths.insert(path.clone()) {
            return Err(ContainerError::DuplicatePath { path });
        }
        self.entries.push(ContainerEntry::new(path, bytes));
        Ok(self)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, ContainerError> {
        build(&self.entries)
    }
}
