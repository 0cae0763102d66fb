//! Bounds-checked big-endian cursor over playlist bytes.

use crate::{Error, Result};
use bytes::Buf;

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: pos,
                need: 0,
                have: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.remaining_slice(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        let v = self.remaining_slice(1)?.get_u8();
        self.pos += 1;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let v = self.remaining_slice(2)?.get_u16();
        self.pos += 2;
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let v = self.remaining_slice(4)?.get_u32();
        self.pos += 4;
        Ok(v)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let rest = self.remaining_slice(n)?;
        let slice = &rest[..n];
        self.pos += n;
        Ok(slice)
    }

    /// Read `n` bytes as a lossy ASCII string (clip ids, languages).
    pub fn string(&mut self, n: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.bytes(n)?).into_owned())
    }

    fn remaining_slice(&self, need: usize) -> Result<&'a [u8]> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        if rest.remaining() < need {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                need,
                have: rest.remaining(),
            });
        }
        Ok(rest)
    }
}
