use std::str;

use zerocopy::{FromBytes, LayoutVerified, Unaligned};

// MXMD stores every offset and count as a u32 relative to the start of the file.

pub fn parse<T: FromBytes + Unaligned>(bytes: &[u8], offset: usize) -> Option<&T> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::<_, T>::new_unaligned_from_prefix)
        .map(|(res, _)| res.into_ref())
}

/// Reads `count` consecutive `T` starting at `offset`.
pub fn parse_table<T: FromBytes + Unaligned>(
    bytes: &[u8],
    offset: u32,
    count: u32,
) -> Option<&[T]> {
    if count == 0 {
        return Some(&[]);
    }

    bytes
        .get(offset as usize..)
        .and_then(|bytes| LayoutVerified::new_slice_unaligned_from_prefix(bytes, count as usize))
        .map(|(res, _)| res.into_slice())
}

/// Raw payload of `len` bytes, empty payloads never fail.
pub fn parse_bytes(bytes: &[u8], offset: u32, len: usize) -> Option<&[u8]> {
    if len == 0 {
        return Some(&[]);
    }

    let start = offset as usize;
    bytes.get(start..start.checked_add(len)?)
}

pub fn parse_str(bytes: &[u8], offset: u32) -> Option<&str> {
    let tail = bytes.get(offset as usize..).filter(|tail| !tail.is_empty())?;
    let name = tail.split(|&b| b == 0).next()?;
    str::from_utf8(name).ok()
}
