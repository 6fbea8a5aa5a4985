use std::str;

use zerocopy::{FromBytes, LayoutVerified, Unaligned};

pub fn null_terminated_prefix(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        return None;
    }
    bytes.splitn(2, |&b| b == 0).next()
}

pub fn parse<T: FromBytes + Unaligned>(bytes: &[u8], offset: usize) -> Option<&T> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::<_, T>::new_unaligned_from_prefix)
        .map(|(res, _)| res.into_ref())
}

pub fn parse_slice<T: FromBytes + Unaligned>(
    bytes: &[u8],
    offset: usize,
    count: usize,
) -> Option<&[T]> {
    if count == 0 {
        return Some(&[]);
    }

    bytes
        .get(offset..)
        .and_then(|bytes| LayoutVerified::new_slice_unaligned_from_prefix(bytes, count))
        .map(|(res, _)| res.into_slice())
}

pub fn parse_str(bytes: &[u8], offset: usize) -> Option<&str> {
    bytes
        .get(offset..)
        .and_then(null_terminated_prefix)
        .and_then(|name| str::from_utf8(name).ok())
}
