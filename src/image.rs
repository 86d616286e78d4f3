use thiserror::Error;

use crate::teensy41;

/// Contiguous firmware bytes anchored at an absolute base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    pub base_address: u32,
    data: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("firmware image is empty")]
    Empty,

    #[error("image base 0x{actual:08X} does not match target base 0x{expected:08X}")]
    BaseMismatch { expected: u32, actual: u32 },

    #[error("block address 0x{addr:X} does not fit the 24-bit HalfKay address field")]
    AddressOutOfRange { addr: usize },

    #[error("image is {len} bytes, target flash holds {capacity}")]
    TooLarge { len: usize, capacity: usize },

    #[error("no firmware data at 0x{base:08X}")]
    NoDataAtBase { base: u32 },

    #[error("firmware data at 0x{addr:08X} lies below base 0x{base:08X}")]
    BelowBase { addr: u32, base: u32 },
}

/// One `BLOCK_SIZE` window of the image. The final block may be short.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub addr: usize,
    pub data: &'a [u8],
}

impl Block<'_> {
    /// Only in-range bytes count; the padding of a short block is never inspected.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0xFF)
    }

    pub fn is_short(&self) -> bool {
        self.data.len() < teensy41::BLOCK_SIZE
    }
}

impl MemoryImage {
    pub fn new(base_address: u32, data: Vec<u8>) -> Self {
        Self { base_address, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes anchored at `base`, if this image starts there.
    pub fn get(&self, base: u32) -> Option<&[u8]> {
        (base == self.base_address).then_some(self.data.as_slice())
    }

    pub fn num_blocks(&self) -> usize {
        self.data.len().div_ceil(teensy41::BLOCK_SIZE)
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
        self.data
            .chunks(teensy41::BLOCK_SIZE)
            .enumerate()
            .map(|(i, data)| Block {
                addr: i * teensy41::BLOCK_SIZE,
                data,
            })
    }

    /// Checks everything the flasher needs before the first report goes out.
    pub fn validate(&self, expected_base: u32, capacity: usize) -> Result<(), ImageError> {
        if self.data.is_empty() {
            return Err(ImageError::Empty);
        }
        if self.base_address != expected_base {
            return Err(ImageError::BaseMismatch {
                expected: expected_base,
                actual: self.base_address,
            });
        }
        let last_block = (self.num_blocks() - 1) * teensy41::BLOCK_SIZE;
        if last_block > teensy41::MAX_BLOCK_ADDR {
            return Err(ImageError::AddressOutOfRange { addr: last_block });
        }
        if self.data.len() > capacity {
            return Err(ImageError::TooLarge {
                len: self.data.len(),
                capacity,
            });
        }
        Ok(())
    }
}
