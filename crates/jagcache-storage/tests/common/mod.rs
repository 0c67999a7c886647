#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]
//! Synthetic cache builders shared by the integration tests

use jagcache_storage::{
    DATA_FILE_NAME, GROUP_FILE_EXTENSION, IndexRecord, SECTOR_SIZE, SectorHeader, SectorLayout,
    index_file_name,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wrap bytes in an uncompressed container
pub fn container_none(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0];
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Wrap bytes in a gzip container
pub fn container_gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    let payload = encoder.finish().unwrap();
    framed(2, &payload, data.len())
}

/// Wrap bytes in a bzip2 container, dropping the stream magic
pub fn container_bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(1));
    encoder.write_all(data).unwrap();
    let stream = encoder.finish().unwrap();
    framed(1, &stream[4..], data.len())
}

fn framed(kind: u8, payload: &[u8], uncompressed: usize) -> Vec<u8> {
    let mut out = vec![kind];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&(uncompressed as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Pack sub-files into a single-stripe multi-file archive
pub fn pack_files(files: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for file in files {
        out.extend_from_slice(file);
    }
    for file in files {
        out.extend_from_slice(&(file.len() as i32).to_be_bytes());
    }
    out.push(1);
    out
}

/// Protocol 6 reference table listing `(group, sub-file IDs)` pairs
pub fn reference_table(groups: &[(u32, &[u32])]) -> Vec<u8> {
    let mut out = vec![6];
    out.extend_from_slice(&1u32.to_be_bytes());
    out.push(0);
    out.extend_from_slice(&(groups.len() as u16).to_be_bytes());

    let mut previous = 0;
    for (id, _) in groups {
        out.extend_from_slice(&((id - previous) as u16).to_be_bytes());
        previous = *id;
    }
    for (id, _) in groups {
        out.extend_from_slice(&(0xC0DE_0000 | id).to_be_bytes());
    }
    for _ in groups {
        out.extend_from_slice(&3u32.to_be_bytes());
    }
    for (_, files) in groups {
        out.extend_from_slice(&(files.len() as u16).to_be_bytes());
    }
    for (_, files) in groups {
        if files.len() > 1 {
            let mut previous = 0;
            for id in *files {
                out.extend_from_slice(&((id - previous) as u16).to_be_bytes());
                previous = *id;
            }
        }
    }
    out
}

/// Builder for a native cache directory.
///
/// Groups are written in insertion order; consecutive chains are laid out
/// back to back starting at sector 1, except that chains can be reversed to
/// exercise non-sequential next pointers.
#[derive(Default)]
pub struct NativeCacheBuilder {
    groups: Vec<(u8, u32, Vec<u8>)>,
    reverse_chains: bool,
}

impl NativeCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, category: u8, group: u32, data: Vec<u8>) -> Self {
        self.groups.push((category, group, data));
        self
    }

    pub fn reverse_chains(mut self) -> Self {
        self.reverse_chains = true;
        self
    }

    pub fn write(&self, dir: &Path) {
        let mut data = vec![0u8; SECTOR_SIZE];
        let mut records: BTreeMap<u8, Vec<IndexRecord>> = BTreeMap::new();
        records.entry(255).or_default();

        for (category, group, bytes) in &self.groups {
            let layout = SectorLayout::for_archive(*group);
            let chunks: Vec<&[u8]> = bytes.chunks(layout.payload_len()).collect();
            let first = (data.len() / SECTOR_SIZE) as u32;
            let mut sectors: Vec<u32> = (first..first + chunks.len() as u32).collect();
            if self.reverse_chains {
                sectors.reverse();
            }
            data.resize(data.len() + chunks.len() * SECTOR_SIZE, 0);

            for (chunk, payload) in chunks.iter().enumerate() {
                let header = SectorHeader {
                    archive_id: *group,
                    chunk: chunk as u16,
                    next_sector: sectors.get(chunk + 1).copied().unwrap_or(0),
                    index_id: *category,
                };
                let start = sectors[chunk] as usize * SECTOR_SIZE;
                let mut sector = header.to_bytes(layout).unwrap();
                sector.extend_from_slice(payload);
                data[start..start + sector.len()].copy_from_slice(&sector);
            }

            let index = records.entry(*category).or_default();
            if index.len() <= *group as usize {
                index.resize(*group as usize + 1, IndexRecord::default());
            }
            index[*group as usize] = IndexRecord {
                length: bytes.len() as u32,
                sector: sectors.first().copied().unwrap_or(0),
            };
        }

        std::fs::write(dir.join(DATA_FILE_NAME), &data).unwrap();
        for (category, index) in records {
            let bytes: Vec<u8> = index
                .iter()
                .flat_map(|record| record.to_bytes().unwrap())
                .collect();
            std::fs::write(dir.join(index_file_name(category)), bytes).unwrap();
        }
    }
}

/// Write one group file of a directory mirror
pub fn write_mirror_group(root: &Path, category: u8, group: u32, data: &[u8]) {
    let dir = root.join(category.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{group}.{GROUP_FILE_EXTENSION}")), data).unwrap();
}
