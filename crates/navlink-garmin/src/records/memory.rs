//! Map memory payloads.
//!
//! Map images are moved as opaque bytes: the device reports its memory
//! region with Capacity_Data, files are read back as offset-tagged
//! Mem_Data chunks, and uploads are split into Mem_Write chunks.

use navlink_core::{Error, MemoryProperties, Result};

use super::{FormatName, RecordReader};
use crate::commands;
use crate::packet::Packet;

/// Decode a Capacity_Data packet.
pub fn decode_capacity(data: &[u8]) -> Result<MemoryProperties> {
    let mut r = RecordReader::new(FormatName::Other("capacity"), data);
    let props = MemoryProperties {
        region: r.u16()?,
        max_tiles: r.u16()?,
        size: r.u32()?,
    };
    r.finish()?;
    Ok(props)
}

/// A memory file being read back chunk by chunk.
#[derive(Debug, Default)]
pub struct MemoryFile {
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one Mem_Data chunk. Chunks must be contiguous.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        let mut r = RecordReader::new(FormatName::Other("memory chunk"), chunk);
        let offset = r.u32()?;
        if offset as usize != self.data.len() {
            return Err(r.invalid("offset", offset));
        }
        self.data.extend_from_slice(r.rest());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Split `data` into Mem_Write packets of at most `chunk` bytes each.
pub fn write_packets(data: &[u8], chunk: usize) -> Result<Vec<Packet>> {
    let chunk = chunk.max(1);
    data.chunks(chunk)
        .enumerate()
        .map(|(i, part)| {
            let offset = u32::try_from(i * chunk).map_err(|_| {
                Error::InvalidParameter(format!("map of {} bytes is too large", data.len()))
            })?;
            commands::mem_write(offset, part)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_layout() {
        let props = decode_capacity(&[10, 0, 0, 8, 0, 0, 0, 1]).unwrap();
        assert_eq!(
            props,
            MemoryProperties {
                region: 10,
                max_tiles: 0x0800,
                size: 0x0100_0000,
            }
        );
        assert!(decode_capacity(&[10, 0, 0, 8]).is_err());
    }

    #[test]
    fn chunks_must_be_contiguous() {
        let mut file = MemoryFile::new();
        file.push(&[0, 0, 0, 0, b'a', b'b']).unwrap();
        file.push(&[2, 0, 0, 0, b'c']).unwrap();
        let err = file.push(&[9, 0, 0, 0, b'd']).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed memory chunk record: invalid offset 9"
        );
        assert_eq!(file.into_bytes(), b"abc");
    }

    #[test]
    fn write_chunking() {
        let data = vec![7u8; 500];
        let packets = write_packets(&data, 240).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(&packets[1].data()[..4], &240u32.to_le_bytes());
        assert_eq!(packets[2].data().len(), 4 + 20);
        assert!(write_packets(&[], 240).unwrap().is_empty());
    }
}
