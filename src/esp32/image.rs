//! Parser for the ESP32 application image format.
//!
//! An application image starts with an 8-byte header and a 16-byte extended
//! header, followed by the load segments. The image is zero-padded so that it
//! ends on a 16-byte boundary whose final byte is the payload checksum, and it
//! may carry a trailing SHA-256 digest of everything before it.

use std::convert::TryFrom;
use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::IMAGE_MAGIC;

/// Seed value of the payload checksum
const CHECKSUM_SEED: u8 = 0xef;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid image magic: {:#04x}", _0)]
    InvalidMagic(u8),
    #[error("Invalid SPI mode: {:#04x}", _0)]
    InvalidSpiMode(u8),
    #[error("Invalid flash frequency: {:#04x}", _0)]
    InvalidFlashFrequency(u8),
    #[error("Invalid flash size: {:#04x}", _0)]
    InvalidFlashSize(u8),
    #[error("Segment {} extends past the end of the image", _0)]
    SegmentOutOfBounds(usize),
    #[error("Image is truncated")]
    Truncated,
    #[error("I/O error: {}", _0)]
    IoError(#[from] io::Error),
}

/// SPI flash interface mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum SpiMode {
    Qio = 0x00,
    Qout = 0x01,
    Dio = 0x02,
    Dout = 0x03,
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpiMode::Qio => write!(f, "QIO"),
            SpiMode::Qout => write!(f, "QOUT"),
            SpiMode::Dio => write!(f, "DIO"),
            SpiMode::Dout => write!(f, "DOUT"),
        }
    }
}

/// SPI flash clock frequency
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum FlashFrequency {
    Freq40Mhz = 0x00,
    Freq26Mhz = 0x01,
    Freq20Mhz = 0x02,
    Freq80Mhz = 0x0f,
}

impl fmt::Display for FlashFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlashFrequency::Freq40Mhz => write!(f, "40MHz"),
            FlashFrequency::Freq26Mhz => write!(f, "26MHz"),
            FlashFrequency::Freq20Mhz => write!(f, "20MHz"),
            FlashFrequency::Freq80Mhz => write!(f, "80MHz"),
        }
    }
}

/// SPI flash chip size
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum FlashSize {
    Flash1Mb = 0x00,
    Flash2Mb = 0x01,
    Flash4Mb = 0x02,
    Flash8Mb = 0x03,
    Flash16Mb = 0x04,
}

impl fmt::Display for FlashSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlashSize::Flash1Mb => write!(f, "1MB"),
            FlashSize::Flash2Mb => write!(f, "2MB"),
            FlashSize::Flash4Mb => write!(f, "4MB"),
            FlashSize::Flash8Mb => write!(f, "8MB"),
            FlashSize::Flash16Mb => write!(f, "16MB"),
        }
    }
}

/// Chip id carried in the extended image header
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum ChipId {
    Esp32 = 0x0000,
    Esp32S2 = 0x0002,
    Esp32C3 = 0x0005,
    Esp32S3 = 0x0009,
    Esp32C2 = 0x000c,
    Esp32C6 = 0x000d,
    Esp32H2 = 0x0010,
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChipId::Esp32 => write!(f, "ESP32"),
            ChipId::Esp32S2 => write!(f, "ESP32-S2"),
            ChipId::Esp32C3 => write!(f, "ESP32-C3"),
            ChipId::Esp32S3 => write!(f, "ESP32-S3"),
            ChipId::Esp32C2 => write!(f, "ESP32-C2"),
            ChipId::Esp32C6 => write!(f, "ESP32-C6"),
            ChipId::Esp32H2 => write!(f, "ESP32-H2"),
        }
    }
}

/// A load segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Target address of the segment
    pub addr: u32,
    /// Length of the segment data in bytes
    pub size: u32,
}

/// A parsed application image
#[derive(Debug, Clone)]
pub struct AppImage {
    pub spi_mode: SpiMode,
    pub flash_frequency: FlashFrequency,
    pub flash_size: FlashSize,
    /// Entry point address
    pub entry_addr: u32,
    /// Raw chip id - see [`AppImage::chip`] for the decoded variant
    pub chip_id: u16,
    pub min_chip_rev: u8,
    pub segments: Vec<Segment>,
    /// Checksum byte stored in the image
    pub checksum: u8,
    /// Whether the stored checksum matches the segment data
    pub checksum_valid: bool,
    /// Whether the appended SHA-256 digest matches, if one is present
    pub hash_valid: Option<bool>,
}

impl AppImage {
    /// Reads and parses an application image from `reader`.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<AppImage, ParseError> {
        let mut data = Vec::new();

        reader.read_to_end(&mut data)?;

        AppImage::parse(&data)
    }

    /// Parses an application image from `data`.
    pub fn parse(data: &[u8]) -> Result<AppImage, ParseError> {
        let mut cursor = Cursor::new(data);

        let magic = cursor.read_u8()?;
        if magic != IMAGE_MAGIC {
            return Err(ParseError::InvalidMagic(magic));
        }

        let segment_count = cursor.read_u8()?;

        let spi_mode = cursor.read_u8()?;
        let spi_mode =
            SpiMode::try_from(spi_mode).map_err(|_| ParseError::InvalidSpiMode(spi_mode))?;

        // The low nibble holds the flash frequency, the high nibble the flash size
        let freq_size = cursor.read_u8()?;
        let flash_frequency = FlashFrequency::try_from(freq_size & 0x0f)
            .map_err(|_| ParseError::InvalidFlashFrequency(freq_size & 0x0f))?;
        let flash_size = FlashSize::try_from(freq_size >> 4)
            .map_err(|_| ParseError::InvalidFlashSize(freq_size >> 4))?;

        let entry_addr = cursor.read_u32::<LittleEndian>()?;

        // Extended header: skip the wp pin and the spi pin drive settings
        cursor.seek(SeekFrom::Current(4))?;

        let chip_id = cursor.read_u16::<LittleEndian>()?;
        let min_chip_rev = cursor.read_u8()?;

        // Skip the reserved bytes
        cursor.seek(SeekFrom::Current(8))?;

        let hash_appended = cursor.read_u8()? == 1;

        let mut segments = Vec::with_capacity(segment_count as usize);
        let mut checksum = CHECKSUM_SEED;

        for index in 0..segment_count as usize {
            let addr = cursor.read_u32::<LittleEndian>()?;
            let size = cursor.read_u32::<LittleEndian>()?;

            let start = cursor.position() as usize;
            let end = start
                .checked_add(size as usize)
                .filter(|&end| end <= data.len())
                .ok_or(ParseError::SegmentOutOfBounds(index))?;

            for &byte in &data[start..end] {
                checksum ^= byte;
            }

            cursor.set_position(end as u64);
            segments.push(Segment { addr, size });
        }

        // The payload is zero-padded so that the image ends on a 16-byte
        // boundary with the checksum in the final byte
        let payload_len = cursor.position() as usize;
        let checksum_offset = (payload_len / 16 + 1) * 16 - 1;
        let stored_checksum = *data.get(checksum_offset).ok_or(ParseError::Truncated)?;

        let hash_valid = if hash_appended {
            let digest_offset = checksum_offset + 1;
            let digest_end = digest_offset + 32;

            if data.len() < digest_end {
                return Err(ParseError::Truncated);
            }

            let digest = Sha256::digest(&data[..digest_offset]);

            Some(digest.as_slice() == &data[digest_offset..digest_end])
        } else {
            None
        };

        Ok(AppImage {
            spi_mode,
            flash_frequency,
            flash_size,
            entry_addr,
            chip_id,
            min_chip_rev,
            segments,
            checksum: stored_checksum,
            checksum_valid: checksum == stored_checksum,
            hash_valid,
        })
    }

    /// Returns the chip this image targets, if the chip id is a known one.
    pub fn chip(&self) -> Option<ChipId> {
        ChipId::try_from(self.chip_id).ok()
    }
}
