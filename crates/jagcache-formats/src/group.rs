//! Multi-file archive unpacking
//!
//! An archive holding more than one sub-file interleaves them in stripes and
//! appends a table of chunk lengths:
//!
//! ```text
//! [payload ...][lengths: stripes * files x i32][stripes: u8]
//! ```
//!
//! Cell `(s, f)` of the table is the number of bytes sub-file `f` contributes
//! to stripe `s`. Stripes are laid out back to back, and within a stripe the
//! chunks follow sub-file order.

use crate::cursor::ByteReader;
use crate::error::{FormatError, Result};
use crate::reference_table::ArchiveEntry;
use std::collections::BTreeMap;
use tracing::trace;

/// Sub-files of one archive, keyed by sub-file ID
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveGroup {
    files: BTreeMap<u32, Vec<u8>>,
}

impl ArchiveGroup {
    /// Split `data` into `count` sub-files keyed `0..count`.
    ///
    /// With `count == 1` the whole buffer is the single sub-file and no
    /// trailer is read.
    pub fn unpack(data: &[u8], count: usize) -> Result<Self> {
        let chunks = split(data, count)?;
        Ok(Self {
            files: (0u32..).zip(chunks).collect(),
        })
    }

    /// Split an archive using the sub-file IDs recorded in its reference
    /// table entry
    ///
    /// Repeated IDs in the entry are an [`FormatError::InvalidTrailer`].
    pub fn unpack_entry(data: &[u8], entry: &ArchiveEntry) -> Result<Self> {
        let chunks = split(data, entry.sub_file_count())?;
        let mut files = BTreeMap::new();
        for (&id, chunk) in entry.sub_file_ids.iter().zip(chunks) {
            if files.insert(id, chunk).is_some() {
                return Err(FormatError::InvalidTrailer(format!(
                    "archive {} lists sub-file {id} twice",
                    entry.id
                )));
            }
        }
        Ok(Self { files })
    }

    /// Bytes of one sub-file
    pub fn get(&self, id: u32) -> Option<&[u8]> {
        self.files.get(&id).map(Vec::as_slice)
    }

    /// Sub-file IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.files.keys().copied()
    }

    /// Number of sub-files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the group holds no sub-files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over `(id, bytes)` in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.files.iter().map(|(id, data)| (*id, data.as_slice()))
    }

    /// Take ownership of the sub-file map
    pub fn into_files(self) -> BTreeMap<u32, Vec<u8>> {
        self.files
    }
}

impl IntoIterator for ArchiveGroup {
    type Item = (u32, Vec<u8>);
    type IntoIter = std::collections::btree_map::IntoIter<u32, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Reassemble the striped sub-files of `data` in sub-file order
fn split(data: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
    match count {
        0 => return Err(FormatError::InvalidTrailer("sub-file count is zero".into())),
        1 => return Ok(vec![data.to_vec()]),
        _ => {}
    }

    let (&stripes, body) = data
        .split_last()
        .ok_or_else(|| FormatError::InvalidTrailer("empty archive".into()))?;
    let stripes = usize::from(stripes);

    let trailer_len = stripes
        .checked_mul(count)
        .and_then(|cells| cells.checked_mul(4))
        .ok_or_else(|| FormatError::InvalidTrailer("trailer size overflows".into()))?;
    let trailer_start = body.len().checked_sub(trailer_len).ok_or_else(|| {
        FormatError::InvalidTrailer(format!(
            "{stripes} stripes of {count} sub-files need {trailer_len} trailer bytes, {} available",
            body.len()
        ))
    })?;

    // First pass: cell lengths and per-file totals
    let mut trailer = ByteReader::new(&body[trailer_start..]);
    let mut cells = Vec::with_capacity(stripes * count);
    let mut totals = vec![0usize; count];
    for _ in 0..stripes {
        for total in &mut totals {
            let cell = trailer.read_i32()?;
            let len = usize::try_from(cell).map_err(|_| {
                FormatError::InvalidTrailer(format!("negative chunk length {cell}"))
            })?;
            *total = total
                .checked_add(len)
                .ok_or_else(|| FormatError::InvalidTrailer("sub-file length overflows".into()))?;
            cells.push(len);
        }
    }

    // The chunks must tile the payload exactly before anything is allocated
    let covered = totals
        .iter()
        .try_fold(0usize, |sum, &len| sum.checked_add(len))
        .ok_or_else(|| FormatError::InvalidTrailer("payload length overflows".into()))?;
    if covered != trailer_start {
        return Err(FormatError::InvalidTrailer(format!(
            "chunks cover {covered} bytes, trailer starts at {trailer_start}"
        )));
    }

    // Second pass: copy each stripe's chunks out of the payload
    let mut payload = ByteReader::new(&body[..trailer_start]);
    let mut files: Vec<Vec<u8>> = totals.iter().map(|&len| Vec::with_capacity(len)).collect();
    for stripe in cells.chunks_exact(count) {
        for (file, &len) in files.iter_mut().zip(stripe) {
            file.extend_from_slice(payload.take(len)?);
        }
    }

    trace!(
        "Unpacked {} sub-files from {} stripes ({} payload bytes)",
        count, stripes, trailer_start
    );
    Ok(files)
}
