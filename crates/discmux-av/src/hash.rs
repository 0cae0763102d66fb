//! Content hashing for duplicate audio detection.

use crate::Result;
use bytes::Buf;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const FLAC_MAGIC: &[u8; 4] = b"fLaC";
const STREAMINFO: u8 = 0;
/// STREAMINFO body size; the MD5 signature is its last 16 bytes.
const STREAMINFO_LEN: usize = 34;
const MD5_LEN: usize = 16;
/// Magic, first metadata block header, STREAMINFO body.
const HEAD_LEN: usize = 4 + 4 + STREAMINFO_LEN;

/// Hash identifying the decoded audio in a file.
///
/// FLAC files carry an MD5 of their decoded samples in STREAMINFO, which is
/// used directly (prefixed `md5:`). Other files, and FLAC files whose
/// encoder left the signature unset, fall back to a SHA-256 of the file
/// bytes (prefixed `sha256:`).
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut head = [0u8; HEAD_LEN];
    let read = read_up_to(&mut file, &mut head)?;

    if let Some(md5) = streaminfo_md5(&head[..read]) {
        return Ok(format!("md5:{}", hex::encode(md5)));
    }

    let mut hasher = Sha256::new();
    hasher.update(&head[..read]);
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// MD5 signature of a FLAC stream, when STREAMINFO leads the metadata and
/// the signature is set.
fn streaminfo_md5(head: &[u8]) -> Option<[u8; MD5_LEN]> {
    // every read below stays inside HEAD_LEN
    if head.len() < HEAD_LEN || !head.starts_with(FLAC_MAGIC) {
        return None;
    }
    let mut buf = &head[FLAC_MAGIC.len()..];

    // block header: last-block flag (1 bit), type (7 bits), body length (24 bits)
    let block_type = buf.get_u8() & 0x7f;
    let length = buf.get_uint(3) as usize;
    if block_type != STREAMINFO || length != STREAMINFO_LEN {
        return None;
    }

    // block sizes (2 + 2), frame sizes (3 + 3), then sample rate, channels,
    // bit depth and total samples packed into 8 bytes
    buf.advance(18);
    let mut md5 = [0u8; MD5_LEN];
    buf.copy_to_slice(&mut md5);
    md5.iter().any(|b| *b != 0).then_some(md5)
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
