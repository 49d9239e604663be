// Basic Binary Block Format (B3F)
//
// File Format
// [4] magic number encoded as u32 (0xBB33FF00)
// [4] file tag (arbitrary 4 bytes for user)
// [4] version (arbitrary meaning for user, encoded as u32)
// [4] block count (encoded as u32)
// [8] bytes indicating 0 (0x00)
// [8*n] ending offset of block
// [x] pad to 16 byte offset
// [n*len(n)] data (format/encoding/semantics would be implied by file tag). Each block begins at
// [x] pad to 16 byte offset
//
// All integers are little-endian.
//
// The range from byte 16 to 16 + (block count + 1) * 8 is an array of u64 of n+1 length where n is
// number of blocks. Offset for block n is given by array[n] rounded up to 16 bytes. End of block n
// is given by array[n+1].

use std::convert::TryInto;

const MAGIC_NUMBER: u32 = 0xBB33FF00;
const HEADER_SIZE_IN_BYTES: usize = 16;
const BLOCK_LENGTH_SIZE_IN_BYTES: usize = 8;
const BLOCK_ALIGNMENT_IN_BYTES: usize = 16;

fn align_up(offset: usize) -> usize {
    ((offset + BLOCK_ALIGNMENT_IN_BYTES - 1) / BLOCK_ALIGNMENT_IN_BYTES) * BLOCK_ALIGNMENT_IN_BYTES
}

fn data_offset(block_count: usize) -> usize {
    align_up(HEADER_SIZE_IN_BYTES + ((block_count + 1) * BLOCK_LENGTH_SIZE_IN_BYTES))
}

// Reader-side versions of the above. Offsets come from untrusted data and may be anywhere in the
// usize range.
fn checked_align_up(offset: usize) -> Option<usize> {
    let rounded = offset.checked_add(BLOCK_ALIGNMENT_IN_BYTES - 1)?;
    Some((rounded / BLOCK_ALIGNMENT_IN_BYTES) * BLOCK_ALIGNMENT_IN_BYTES)
}

fn checked_data_offset(block_count: usize) -> Option<usize> {
    let table_size = block_count
        .checked_add(1)?
        .checked_mul(BLOCK_LENGTH_SIZE_IN_BYTES)?;
    checked_align_up(HEADER_SIZE_IN_BYTES.checked_add(table_size)?)
}

pub struct B3FWriter<'a> {
    file_tag: u32,
    version: u32,
    blocks: Vec<&'a [u8]>,
}

impl<'a> B3FWriter<'a> {
    pub fn new_from_u8_tag(
        file_tag: [u8; 4],
        version: u32,
    ) -> Self {
        B3FWriter {
            file_tag: u32::from_le_bytes(file_tag),
            version,
            blocks: Vec::default(),
        }
    }

    pub fn add_block(
        &mut self,
        data: &'a [u8],
    ) {
        self.blocks.push(data);
    }

    pub fn write<W: std::io::Write>(
        &self,
        mut writer: W,
    ) -> std::io::Result<()> {
        //
        // 16 byte header
        //
        writer.write_all(&MAGIC_NUMBER.to_le_bytes())?;
        writer.write_all(&self.file_tag.to_le_bytes())?;
        writer.write_all(&self.version.to_le_bytes())?;
        let block_count = self.blocks.len() as u32;
        writer.write_all(&block_count.to_le_bytes())?;

        //
        // A single u64 zero + N u64 block end positions
        //
        writer.write_all(&0u64.to_le_bytes())?;

        let mut block_begin = 0;
        for block in &self.blocks {
            let block_end = block_begin + block.len();
            writer.write_all(&(block_end as u64).to_le_bytes())?;

            // Realign to 16 bytes, this is where the next block begins
            block_begin = align_up(block_end);
        }

        //
        // Pad block 0 to start at a 16 byte offset
        //
        let table_end =
            HEADER_SIZE_IN_BYTES + ((self.blocks.len() + 1) * BLOCK_LENGTH_SIZE_IN_BYTES);
        let padding = data_offset(self.blocks.len()) - table_end;
        writer.write_all(&[0u8; BLOCK_ALIGNMENT_IN_BYTES][..padding])?;

        //
        // Write the blocks
        //
        for block in &self.blocks {
            writer.write_all(block)?;
            let padding = align_up(block.len()) - block.len();
            writer.write_all(&[0u8; BLOCK_ALIGNMENT_IN_BYTES][..padding])?;
        }

        Ok(())
    }

    pub fn write_to_vec(&self) -> Vec<u8> {
        let mut data = Vec::default();
        // Writing into a Vec cannot fail
        let _ = self.write(&mut data);
        data
    }
}

pub struct B3FReader<'a> {
    data: &'a [u8],
}

impl<'a> B3FReader<'a> {
    /// Returns None if the data is too short or does not start with the magic number
    pub fn new(data: &'a [u8]) -> Option<B3FReader<'a>> {
        if data.len() < HEADER_SIZE_IN_BYTES {
            return None;
        }

        let magic_number = u32::from_le_bytes(data[0..4].try_into().ok()?);
        if magic_number != MAGIC_NUMBER {
            return None;
        }

        let reader = B3FReader { data };
        if data.len() < checked_data_offset(reader.block_count())? {
            return None;
        }

        Some(reader)
    }

    pub fn file_tag_as_u8(&self) -> &[u8] {
        &self.data[4..8]
    }

    pub fn version(&self) -> u32 {
        u32::from_le_bytes([self.data[8], self.data[9], self.data[10], self.data[11]])
    }

    pub fn block_count(&self) -> usize {
        u32::from_le_bytes([self.data[12], self.data[13], self.data[14], self.data[15]]) as usize
    }

    fn block_table_entry(
        &self,
        index: usize,
    ) -> Option<usize> {
        let offset = HEADER_SIZE_IN_BYTES + (index * BLOCK_LENGTH_SIZE_IN_BYTES);
        let bytes = self.data.get(offset..offset + BLOCK_LENGTH_SIZE_IN_BYTES)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?) as usize)
    }

    /// Returns None if the index is out of range or the block table points outside the data
    pub fn get_block(
        &self,
        index: usize,
    ) -> Option<&'a [u8]> {
        if index >= self.block_count() {
            return None;
        }

        // Begin position needs to be rounded up to 16-byte offset
        let begin = checked_align_up(self.block_table_entry(index)?)?;
        let end = self.block_table_entry(index + 1)?;
        let data = self.data.get(checked_data_offset(self.block_count())?..)?;
        if begin > end || end > data.len() {
            return None;
        }

        data.get(begin..end)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blocks_are_aligned_and_recoverable() {
        let first = [1u8; 5];
        let second = [2u8; 16];
        let third = [3u8; 0];

        let mut writer = B3FWriter::new_from_u8_tag(*b"TEST", 7);
        writer.add_block(&first);
        writer.add_block(&second);
        writer.add_block(&third);
        let data = writer.write_to_vec();
        assert_eq!(data.len() % 16, 0);

        let reader = B3FReader::new(&data).unwrap();
        assert_eq!(reader.file_tag_as_u8(), b"TEST");
        assert_eq!(reader.version(), 7);
        assert_eq!(reader.block_count(), 3);
        assert_eq!(reader.get_block(0).unwrap(), &first);
        assert_eq!(reader.get_block(1).unwrap(), &second);
        assert_eq!(reader.get_block(2).unwrap(), &third);
        assert!(reader.get_block(3).is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(B3FReader::new(&[]).is_none());
        assert!(B3FReader::new(&[0u8; 64]).is_none());

        // Valid magic number, but claims more blocks than the data can hold
        let mut data = Vec::default();
        data.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        data.extend_from_slice(b"TEST");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1000u32.to_le_bytes());
        assert!(B3FReader::new(&data).is_none());
    }

    #[test]
    fn truncated_block_is_rejected() {
        let block = [9u8; 40];
        let mut writer = B3FWriter::new_from_u8_tag(*b"TEST", 1);
        writer.add_block(&block);
        let data = writer.write_to_vec();

        let truncated = &data[..data.len() - 20];
        let reader = B3FReader::new(truncated).unwrap();
        assert!(reader.get_block(0).is_none());
    }

    #[test]
    fn corrupt_block_table_is_rejected() {
        let block = [4u8; 24];
        let mut writer = B3FWriter::new_from_u8_tag(*b"TEST", 1);
        writer.add_block(&block);
        let data = writer.write_to_vec();

        // Start of block 0 overwritten with an offset that overflows when aligned
        let mut corrupt = data.clone();
        corrupt[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        let reader = B3FReader::new(&corrupt).unwrap();
        assert!(reader.get_block(0).is_none());

        // End of block 0 points far past the end of the data
        let mut corrupt = data.clone();
        corrupt[24..32].copy_from_slice(&u64::MAX.to_le_bytes());
        let reader = B3FReader::new(&corrupt).unwrap();
        assert!(reader.get_block(0).is_none());

        // The untouched file still reads
        let reader = B3FReader::new(&data).unwrap();
        assert_eq!(reader.get_block(0).unwrap(), &block);
    }

    #[test]
    fn huge_block_count_is_rejected() {
        let mut data = Vec::default();
        data.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        data.extend_from_slice(b"TEST");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 64]);
        assert!(B3FReader::new(&data).is_none());
    }
}
