//! Block-level structures: the file header (block 0), the log header
//! (block 1), and the per-block header that precedes every data block.
//! Layout per spec.md §6.

use crate::error::{CResult, Error};
use crate::primitives::{read_scn48, read_u16, read_u32, ByteOrder, Scn};

/// Magic recognized in block 0. Any other value is `CorruptLog`.
pub const FILE_MAGIC: u32 = 0x5245444F; // "REDO"

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSize {
    B512 = 512,
    B1024 = 1024,
    B2048 = 2048,
    B4096 = 4096,
}

impl BlockSize {
    pub fn from_usize(n: usize) -> CResult<BlockSize> {
        match n {
            512 => Ok(BlockSize::B512),
            1024 => Ok(BlockSize::B1024),
            2048 => Ok(BlockSize::B2048),
            4096 => Ok(BlockSize::B4096),
            other => Err(Error::CorruptLog(format!("unsupported block size {other}"))),
        }
    }

    pub fn bytes(self) -> usize {
        self as usize
    }
}

/// Parsed block-1 log header.
#[derive(Debug, Clone)]
pub struct LogHeader {
    pub block_size: BlockSize,
    pub block_count: u32,
    pub sequence: u32,
    pub first_scn: Scn,
    pub next_scn: Scn,
    pub resetlogs_id: u32,
    pub activation_id: u32,
    pub byte_order: ByteOrder,
    pub version: u16,
    /// Highest block number that is completely written as of this read.
    /// For archived logs this equals `block_count`; for an online log
    /// still being written it may be lower, and reads beyond it are
    /// transient rather than fatal.
    pub highest_written_block: u32,
}

impl LogHeader {
    /// Parses block 0 (file-type magic) and block 1 (log header) from a
    /// buffer containing at least two blocks' worth of bytes.
    ///
    /// Block 0 is always a fixed 512 bytes regardless of the block size
    /// declared inside block 1 (which applies to block 1 itself and every
    /// data block from block 2 onward) -- this resolves the chicken/egg
    /// problem of not knowing the block size before having read it.
    pub fn parse(buf: &[u8]) -> CResult<LogHeader> {
        if buf.len() < 1024 {
            return Err(Error::CorruptLog("file too short for header blocks".into()));
        }

        // Byte order is declared in block 1; block 0's magic is read in
        // whichever order we guess first, then re-validated.
        let byte_order_byte = buf[512 + 32];
        let byte_order = ByteOrder::from_header_byte(byte_order_byte);

        let magic = read_u32(buf, 0, byte_order)?;
        if magic != FILE_MAGIC {
            return Err(Error::CorruptLog(format!(
                "bad file magic: 0x{magic:08x}, expected 0x{FILE_MAGIC:08x}"
            )));
        }

        let block_size_raw = read_u16(buf, 512 + 0, byte_order)? as usize;
        let block_size = BlockSize::from_usize(block_size_raw)?;
        let block_count = read_u32(buf, 512 + 2, byte_order)?;
        let magic2 = read_u32(buf, 512 + 6, byte_order)?;
        if magic2 != FILE_MAGIC {
            return Err(Error::CorruptLog("log header magic mismatch".into()));
        }
        let sequence = read_u32(buf, 512 + 10, byte_order)?;
        let first_scn = read_scn48(buf, 512 + 14, byte_order)?;
        let next_scn = read_scn48(buf, 512 + 20, byte_order)?;
        let resetlogs_id = read_u32(buf, 512 + 26, byte_order)?;
        let activation_id = read_u32(buf, 512 + 30, byte_order)?;
        let version = read_u16(buf, 512 + 33, byte_order)?;
        let highest_written_block = read_u32(buf, 512 + 35, byte_order).unwrap_or(block_count);

        Ok(LogHeader {
            block_size,
            block_count,
            sequence,
            first_scn,
            next_scn,
            resetlogs_id,
            activation_id,
            byte_order,
            version,
            highest_written_block,
        })
    }
}

/// Per-block header preceding every data block (block index >= 2), per
/// spec.md §6: `(kind:u8, klass:u8, block_number:u32, sequence:u32,
/// offset:u16, checksum:u16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockHeader {
    pub kind: u8,
    pub klass: u8,
    pub block_number: u32,
    pub sequence: u32,
    pub offset: u16,
    pub checksum: u16,
}

pub const DATA_BLOCK_HEADER_LEN: usize = 14;

impl DataBlockHeader {
    pub fn parse(buf: &[u8], order: ByteOrder) -> CResult<DataBlockHeader> {
        if buf.len() < DATA_BLOCK_HEADER_LEN {
            return Err(Error::CorruptLog("short block header".into()));
        }
        Ok(DataBlockHeader {
            kind: buf[0],
            klass: buf[1],
            block_number: read_u32(buf, 2, order)?,
            sequence: read_u32(buf, 6, order)?,
            offset: read_u16(buf, 10, order)?,
            checksum: read_u16(buf, 12, order)?,
        })
    }
}

/// Computes the 16-bit XOR checksum over a block with the checksum
/// field's own two bytes zeroed out, per spec.md §4.2.
pub fn xor_checksum(block: &[u8], checksum_offset: usize) -> u16 {
    let mut acc: u16 = 0;
    for (i, chunk) in block.chunks(2).enumerate() {
        let word = if chunk.len() == 2 {
            u16::from_le_bytes([chunk[0], chunk[1]])
        } else {
            chunk[0] as u16
        };
        let byte_offset = i * 2;
        if byte_offset == checksum_offset {
            continue;
        }
        acc ^= word;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_header(block_size: u16, sequence: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        buf[0..4].copy_from_slice(&FILE_MAGIC.to_le_bytes());
        buf[512 + 32] = 0x00; // little-endian
        buf[512..512 + 2].copy_from_slice(&block_size.to_le_bytes());
        buf[512 + 2..512 + 6].copy_from_slice(&4u32.to_le_bytes()); // block_count
        buf[512 + 6..512 + 10].copy_from_slice(&FILE_MAGIC.to_le_bytes());
        buf[512 + 10..512 + 14].copy_from_slice(&sequence.to_le_bytes());
        buf
    }

    #[test]
    fn parses_minimal_header() {
        let buf = synth_header(1024, 42);
        let header = LogHeader::parse(&buf).unwrap();
        assert_eq!(header.sequence, 42);
        assert_eq!(header.block_size, BlockSize::B1024);
        assert_eq!(header.byte_order, ByteOrder::Little);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = synth_header(1024, 1);
        buf[0] = 0;
        assert!(LogHeader::parse(&buf).is_err());
    }

    #[test]
    fn rejects_unsupported_block_size() {
        let buf = synth_header(333, 1);
        assert!(LogHeader::parse(&buf).is_err());
    }

    #[test]
    fn checksum_is_order_independent_of_checksum_field() {
        let mut block = vec![0u8; 512];
        for (i, b) in block.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let before = xor_checksum(&block, 10);
        block[10] = 0xAB;
        block[11] = 0xCD;
        let after = xor_checksum(&block, 10);
        assert_eq!(before, after);
    }
}
