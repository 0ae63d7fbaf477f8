use serde::Serialize;

use super::error::{RecordError, RecordResult};
use crate::file::PAGE_SIZE;

/// File header stored at the start of page 0 of every record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordFileHeader {
    record_size: u32,         // 4 bytes - Size of every record, fixed at creation
    pub first_free_page: u32, // 4 bytes - Reserved for the free-page list (0 = none)
    pub record_count: u32,    // 4 bytes - Reserved for the record counter
}

impl RecordFileHeader {
    pub const SIZE: usize = 12;

    /// Build the header for a new file, checking `0 < record_size <= PAGE_SIZE`
    pub fn new(record_size: usize) -> RecordResult<Self> {
        Self::check_record_size(record_size)?;

        Ok(Self {
            record_size: record_size as u32,
            first_free_page: 0,
            record_count: 0,
        })
    }

    fn check_record_size(record_size: usize) -> RecordResult<()> {
        if record_size == 0 {
            return Err(RecordError::InvalidRecordSize(record_size));
        }
        if record_size > PAGE_SIZE {
            return Err(RecordError::OversizeRecord {
                record_size,
                capacity: PAGE_SIZE,
            });
        }
        Ok(())
    }

    pub fn record_size(&self) -> usize {
        self.record_size as usize
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[0..4].copy_from_slice(&self.record_size.to_le_bytes());
        result[4..8].copy_from_slice(&self.first_free_page.to_le_bytes());
        result[8..12].copy_from_slice(&self.record_count.to_le_bytes());
        result
    }

    /// Decode a header page, rejecting record sizes no file could have been created with
    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE {
            return Err(RecordError::CorruptHeader(format!(
                "Not enough data for file header: {} bytes",
                data.len()
            )));
        }

        let record_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let first_free_page = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let record_count = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);

        if record_size == 0 || record_size as usize > PAGE_SIZE {
            return Err(RecordError::CorruptHeader(format!(
                "record size {} outside 1..={}",
                record_size, PAGE_SIZE
            )));
        }

        Ok(Self {
            record_size,
            first_free_page,
            record_count,
        })
    }

    /// Write the header into the first bytes of a page buffer. A header that
    /// could not be decoded again is refused and the page is left untouched.
    pub fn write_to(&self, page: &mut [u8]) -> RecordResult<()> {
        Self::check_record_size(self.record_size())?;
        if page.len() < Self::SIZE {
            return Err(RecordError::CorruptHeader(format!(
                "Page buffer too small for file header: {} bytes",
                page.len()
            )));
        }
        page[..Self::SIZE].copy_from_slice(&self.serialize());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_sizes() {
        assert!(matches!(
            RecordFileHeader::new(0),
            Err(RecordError::InvalidRecordSize(0))
        ));
        assert!(matches!(
            RecordFileHeader::new(PAGE_SIZE + 1),
            Err(RecordError::OversizeRecord { record_size, capacity })
                if record_size == PAGE_SIZE + 1 && capacity == PAGE_SIZE
        ));
        assert_eq!(RecordFileHeader::new(PAGE_SIZE).unwrap().record_size(), PAGE_SIZE);
    }

    #[test]
    fn test_record_size_is_first_field() {
        let header = RecordFileHeader::new(40).unwrap();
        let bytes = header.serialize();

        assert_eq!(&bytes[0..4], &40u32.to_le_bytes());
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_deserialize_page() {
        let mut page = vec![0u8; PAGE_SIZE];
        let mut header = RecordFileHeader::new(128).unwrap();
        header.record_count = 7;
        header.write_to(&mut page).unwrap();

        assert_eq!(RecordFileHeader::deserialize(&page).unwrap(), header);
    }

    #[test]
    fn test_deserialize_rejects_corrupt_header() {
        let zeroed = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            RecordFileHeader::deserialize(&zeroed),
            Err(RecordError::CorruptHeader(_))
        ));

        let mut oversized = vec![0u8; PAGE_SIZE];
        oversized[0..4].copy_from_slice(&(PAGE_SIZE as u32 + 1).to_le_bytes());
        assert!(matches!(
            RecordFileHeader::deserialize(&oversized),
            Err(RecordError::CorruptHeader(_))
        ));

        assert!(matches!(
            RecordFileHeader::deserialize(&[1, 0, 0]),
            Err(RecordError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_write_to_refuses_invalid_record_size() {
        let mut page = vec![0xAAu8; PAGE_SIZE];

        let empty = RecordFileHeader {
            record_size: 0,
            first_free_page: 0,
            record_count: 0,
        };
        assert!(matches!(
            empty.write_to(&mut page),
            Err(RecordError::InvalidRecordSize(0))
        ));

        let oversized = RecordFileHeader {
            record_size: PAGE_SIZE as u32 + 1,
            ..empty
        };
        assert!(matches!(
            oversized.write_to(&mut page),
            Err(RecordError::OversizeRecord { .. })
        ));
        assert!(page.iter().all(|&b| b == 0xAA));
    }
}
