//! Reading and writing guest linear memory
//!
//! Every function here works on a borrowed slice of guest memory, so nothing
//! it returns can outlive the host call that produced the slice. The guest may
//! grow (and move) its memory between calls.

use std::borrow::Cow;
use std::ops::Range;

use bytemuck::Pod;

/// Maximum distance scanned for a NUL terminator (100 KiB)
pub const DEFAULT_SCAN_LIMIT: usize = 100 * 1024;

/// Errors produced while marshaling data out of (or into) guest memory
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    #[error("range {offset:#x}+{len} exceeds guest memory of {memory_len} bytes")]
    OutOfBounds {
        offset: u32,
        len: usize,
        memory_len: usize,
    },
    #[error("no NUL terminator within {limit} bytes of {offset:#x}")]
    Unterminated {
        offset: u32,
        limit: usize,
    },
    #[error("offset {offset:#x} is not aligned to {align} bytes")]
    Misaligned {
        offset: u32,
        align: usize,
    },
    #[error("{count} elements at {offset:#x} overflow the address space")]
    Overflow {
        offset: u32,
        count: u32,
    },
}

fn byte_range(memory_len: usize, offset: u32, len: usize) -> Result<Range<usize>, MarshalError> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= memory_len => Ok(start..end),
        _ => Err(MarshalError::OutOfBounds {
            offset,
            len,
            memory_len,
        }),
    }
}

/// Decode a NUL-terminated UTF-8 string starting at `offset`
///
/// Only the first `scan_limit` bytes are searched. A NUL at index `k` yields
/// exactly the `k` bytes before it. Invalid UTF-8 is replaced with U+FFFD.
pub fn read_c_string(
    memory: &[u8],
    offset: u32,
    scan_limit: usize,
) -> Result<Cow<'_, str>, MarshalError> {
    let window = memory
        .get(offset as usize..)
        .ok_or(MarshalError::OutOfBounds {
            offset,
            len: 0,
            memory_len: memory.len(),
        })?;
    let window = &window[..window.len().min(scan_limit)];

    match window.iter().position(|&b| b == 0) {
        Some(len) => Ok(String::from_utf8_lossy(&window[..len])),
        None => Err(MarshalError::Unterminated {
            offset,
            limit: scan_limit,
        }),
    }
}

/// Decode exactly `len` bytes at `offset` as UTF-8
pub fn read_sized_string(
    memory: &[u8],
    offset: u32,
    len: u32,
) -> Result<Cow<'_, str>, MarshalError> {
    let range = byte_range(memory.len(), offset, len as usize)?;
    Ok(String::from_utf8_lossy(&memory[range]))
}

/// Typed view of `count` elements of `T` starting at `offset`
///
/// Offsets must be a multiple of `T`'s alignment, the rule typed arrays
/// enforce. The view borrows guest memory when the host address is aligned
/// and falls back to a copy otherwise.
pub fn view_array<T: Pod>(
    memory: &[u8],
    offset: u32,
    count: u32,
) -> Result<Cow<'_, [T]>, MarshalError> {
    let align = std::mem::align_of::<T>();
    if offset as usize % align != 0 {
        return Err(MarshalError::Misaligned { offset, align });
    }
    let len = (count as usize)
        .checked_mul(std::mem::size_of::<T>())
        .ok_or(MarshalError::Overflow { offset, count })?;
    let bytes = &memory[byte_range(memory.len(), offset, len)?];

    Ok(match bytemuck::try_cast_slice(bytes) {
        Ok(view) => Cow::Borrowed(view),
        Err(_) => Cow::Owned(
            bytes
                .chunks_exact(std::mem::size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        ),
    })
}

/// Byte view of `len` bytes at `offset`
pub fn view_bytes(memory: &[u8], offset: u32, len: u32) -> Result<&[u8], MarshalError> {
    let range = byte_range(memory.len(), offset, len as usize)?;
    Ok(&memory[range])
}

/// Writable byte view of `len` bytes at `offset`
pub fn view_bytes_mut(memory: &mut [u8], offset: u32, len: u32) -> Result<&mut [u8], MarshalError> {
    let range = byte_range(memory.len(), offset, len as usize)?;
    Ok(&mut memory[range])
}

/// `f32` view of `count` floats at `offset`
pub fn view_f32(memory: &[u8], offset: u32, count: u32) -> Result<Cow<'_, [f32]>, MarshalError> {
    view_array::<f32>(memory, offset, count)
}

/// Write as many whole characters of `text` as fit into `dst`
///
/// Returns the number of bytes written. A character that does not fit is not
/// split.
pub fn encode_into(text: &str, dst: &mut [u8]) -> usize {
    let mut written = 0;
    for ch in text.chars() {
        let n = ch.len_utf8();
        if written + n > dst.len() {
            break;
        }
        ch.encode_utf8(&mut dst[written..written + n]);
        written += n;
    }
    written
}

/// Write `text` plus a NUL terminator at `offset`
///
/// At most `capacity` bytes are used (terminator included); with no capacity
/// the write is bounded by the end of memory. Text that does not fit is
/// truncated on a character boundary. Returns the text bytes written.
pub fn write_c_string(
    memory: &mut [u8],
    offset: u32,
    capacity: Option<usize>,
    text: &str,
) -> Result<usize, MarshalError> {
    let memory_len = memory.len();
    let available = memory_len.saturating_sub(offset as usize);
    let capacity = capacity.map_or(available, |cap| cap.min(available));
    if capacity == 0 {
        return Err(MarshalError::OutOfBounds {
            offset,
            len: 1,
            memory_len,
        });
    }

    let start = offset as usize;
    let written = encode_into(text, &mut memory[start..start + capacity - 1]);
    memory[start + written] = 0;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(offset: usize, bytes: &[u8], size: usize) -> Vec<u8> {
        let mut memory = vec![0xAA; size];
        memory[offset..offset + bytes.len()].copy_from_slice(bytes);
        memory
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        let memory = memory_with(16, b"uModelView\0trailing", 64);
        let text = read_c_string(&memory, 16, DEFAULT_SCAN_LIMIT).unwrap();
        assert_eq!(text, "uModelView");
    }

    #[test]
    fn test_c_string_empty() {
        let memory = memory_with(0, b"\0", 8);
        assert_eq!(read_c_string(&memory, 0, DEFAULT_SCAN_LIMIT).unwrap(), "");
    }

    #[test]
    fn test_c_string_utf8() {
        let memory = memory_with(4, "héllo ✓\0".as_bytes(), 32);
        assert_eq!(
            read_c_string(&memory, 4, DEFAULT_SCAN_LIMIT).unwrap(),
            "héllo ✓"
        );
    }

    #[test]
    fn test_c_string_invalid_utf8_is_replaced() {
        let memory = memory_with(0, b"a\xFFb\0", 8);
        assert_eq!(
            read_c_string(&memory, 0, DEFAULT_SCAN_LIMIT).unwrap(),
            "a\u{FFFD}b"
        );
    }

    #[test]
    fn test_c_string_without_terminator_in_window() {
        let memory = vec![b'x'; DEFAULT_SCAN_LIMIT + 16];
        assert_eq!(
            read_c_string(&memory, 0, DEFAULT_SCAN_LIMIT),
            Err(MarshalError::Unterminated {
                offset: 0,
                limit: DEFAULT_SCAN_LIMIT
            })
        );
    }

    #[test]
    fn test_c_string_nul_just_past_limit() {
        let mut memory = vec![b'x'; 32];
        memory[8] = 0;
        assert!(read_c_string(&memory, 0, 8).is_err());
        assert_eq!(read_c_string(&memory, 0, 9).unwrap().len(), 8);
    }

    #[test]
    fn test_c_string_runs_off_end_of_memory() {
        let memory = vec![b'x'; 32];
        assert!(matches!(
            read_c_string(&memory, 30, DEFAULT_SCAN_LIMIT),
            Err(MarshalError::Unterminated { .. })
        ));
        assert!(matches!(
            read_c_string(&memory, 33, DEFAULT_SCAN_LIMIT),
            Err(MarshalError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_sized_string_ignores_nul() {
        let memory = memory_with(2, b"ab\0cd", 16);
        assert_eq!(read_sized_string(&memory, 2, 5).unwrap(), "ab\0cd");
        assert_eq!(read_sized_string(&memory, 2, 2).unwrap(), "ab");
        assert!(read_sized_string(&memory, 10, 7).is_err());
    }

    #[test]
    fn test_view_f32_length_matches_count() {
        let floats = [1.0f32, -2.5, 3.25, 0.0, 8.0];
        let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
        let memory = memory_with(8, &bytes, 64);

        let view = view_f32(&memory, 8, 4).unwrap();
        assert_eq!(view.len(), 4);
        assert_eq!(&view[..], &floats[..4]);
    }

    #[test]
    fn test_view_never_reads_past_requested_range() {
        let memory = vec![0u8; 32];
        assert!(view_f32(&memory, 16, 4).is_ok());
        assert!(matches!(
            view_f32(&memory, 16, 5),
            Err(MarshalError::OutOfBounds { len: 20, .. })
        ));
        assert_eq!(view_bytes(&memory, 30, 2).unwrap().len(), 2);
        assert!(view_bytes(&memory, 30, 3).is_err());
    }

    #[test]
    fn test_view_rejects_misaligned_offset() {
        let memory = vec![0u8; 32];
        assert_eq!(
            view_f32(&memory, 2, 1),
            Err(MarshalError::Misaligned { offset: 2, align: 4 })
        );
    }

    #[test]
    fn test_view_huge_count_is_rejected() {
        let memory = vec![0u8; 32];
        assert!(view_array::<[f32; 4]>(&memory, 0, u32::MAX).is_err());
    }

    #[test]
    fn test_encode_into_does_not_split_characters() {
        let mut dst = [0u8; 4];
        assert_eq!(encode_into("KUP", &mut dst), 3);
        assert_eq!(&dst[..3], b"KUP");

        let mut dst = [0u8; 2];
        assert_eq!(encode_into("a✓", &mut dst), 1);
        assert_eq!(encode_into("", &mut dst), 0);
    }

    #[test]
    fn test_write_c_string_truncates_to_capacity() {
        let mut memory = vec![0xFFu8; 16];
        let written = write_c_string(&mut memory, 4, Some(4), "ERROR: x").unwrap();
        assert_eq!(written, 3);
        assert_eq!(&memory[4..8], b"ERR\0");
        assert_eq!(memory[8], 0xFF);
    }

    #[test]
    fn test_write_c_string_bounded_by_memory() {
        let mut memory = vec![0xFFu8; 8];
        assert_eq!(write_c_string(&mut memory, 5, None, "abcdef").unwrap(), 2);
        assert_eq!(&memory[5..], b"ab\0");
        assert!(write_c_string(&mut memory, 8, None, "a").is_err());
    }
}
