use std::io::{self, Read, Seek, SeekFrom};

use super::ReadAt;

/// A seekable reader over the window `[start, end)` of a [`ReadAt`] source.
///
/// Positions are relative to `start`. Reads never cross `end`, so a record
/// that claims more bytes than its window holds surfaces as
/// `UnexpectedEof` instead of bleeding into the next structure.
pub struct ByteCursor<'a, R: ReadAt + ?Sized> {
    source: &'a R,
    start: u64,
    end: u64,
    pos: u64,
}

impl<'a, R: ReadAt + ?Sized> ByteCursor<'a, R> {
    /// Cursor over the whole source.
    pub fn new(source: &'a R) -> Self {
        let end = source.size();
        Self::window(source, 0, end)
    }

    /// Cursor over `[start, end)`, clamped to the source size.
    pub fn window(source: &'a R, start: u64, end: u64) -> Self {
        let end = end.min(source.size());
        let start = start.min(end);
        Self {
            source,
            start,
            end,
            pos: 0,
        }
    }

    /// Current position relative to the window start.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Absolute offset in the source of the current position.
    pub fn absolute_position(&self) -> u64 {
        self.start + self.pos
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.pos)
    }

    /// Read exactly `len` bytes into a fresh buffer.
    pub fn read_vec(&mut self, len: u64) -> io::Result<Vec<u8>> {
        if len > self.remaining() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Advance by `len` bytes without reading them.
    pub fn skip(&mut self, len: u64) -> io::Result<()> {
        if len > self.remaining() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.pos += len;
        Ok(())
    }
}

impl<R: ReadAt + ?Sized> Read for ByteCursor<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        let n = self
            .source
            .read_at(self.start + self.pos, &mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: ReadAt + ?Sized> Seek for ByteCursor<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.len().checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match target {
            Some(p) if p <= self.len() => {
                self.pos = p;
                Ok(p)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside of cursor window",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt};

    #[test]
    fn test_window_bounds_reads() {
        let data: Vec<u8> = (0u8..16).collect();
        let mut cursor = ByteCursor::window(&data, 4, 8);
        assert_eq!(cursor.len(), 4);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 0x0504);
        assert_eq!(cursor.absolute_position(), 6);
        assert_eq!(cursor.read_vec(2).unwrap(), vec![6, 7]);
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_seek_within_window() {
        let data = b"PK\x05\x06tail".to_vec();
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.seek(SeekFrom::End(-4)).unwrap(), 4);
        assert_eq!(cursor.read_vec(4).unwrap(), b"tail");
        assert!(cursor.seek(SeekFrom::Current(1)).is_err());
        assert!(cursor.skip(1).is_err());
        assert_eq!(cursor.seek(SeekFrom::Start(0)).unwrap(), 0);
        cursor.skip(2).unwrap();
        assert_eq!(cursor.remaining(), 6);
    }
}
