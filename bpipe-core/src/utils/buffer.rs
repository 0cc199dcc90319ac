use std::cmp::min;

use bytes::{BufMut, Bytes, BytesMut};

/// Split `arr` into slices of at most `len` bytes without copying.
pub fn get_chunks(arr: Bytes, len: usize) -> Vec<Bytes> {
    assert!(len != 0, "len should be greater than 0");

    if arr.is_empty() {
        return vec![arr];
    }

    let mut chunks = Vec::with_capacity((arr.len() + len - 1) / len);
    let mut ptr = 0;

    while ptr < arr.len() {
        let end = min(arr.len(), ptr + len);
        chunks.push(arr.slice(ptr..end));
        ptr = end;
    }

    chunks
}

pub fn num_to_buf_be(num: u64, nbytes: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(nbytes);
    buf.put_uint(num, nbytes);
    buf.freeze()
}

pub fn num_to_buf_le(num: u128, nbytes: usize) -> Bytes {
    assert!(nbytes <= 16, "nbytes should not exceed 16");

    let mut buf = BytesMut::with_capacity(16);
    buf.put_u128_le(num);
    buf.freeze().slice(0..nbytes)
}

/// Concatenate `head` and `tail` into a single buffer.
pub fn concat(head: &[u8], tail: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(head.len() + tail.len());
    buf.put_slice(head);
    buf.put_slice(tail);
    buf.freeze()
}
