//! Gebufferde bytebron met één teken terugzetruimte en regeltelling.

use std::io::{self, BufRead, BufReader, Read};

/// Leest bytes uit een willekeurige [`Read`]-bron.
///
/// Tekstbytes (`next_byte`) tellen regels; binaire payloadbytes
/// (`next_raw`, `read_exact`) niet, zodat een `0x0A` in een float de
/// regelnummers niet verschuift.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: BufReader<R>,
    putback: Option<u8>,
    line: usize,
}

impl<R: Read> ByteReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            putback: None,
            line: 1,
        }
    }

    /// Huidige regel (1-gebaseerd).
    pub fn line(&self) -> usize {
        self.line
    }

    fn fetch(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(buf) => {
                    let byte = buf[0];
                    self.inner.consume(1);
                    return Ok(Some(byte));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Volgende byte als tekst; een newline verhoogt de regelteller.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.putback.take() {
            Some(byte) => Some(byte),
            None => self.fetch()?,
        };
        if byte == Some(b'\n') {
            self.line += 1;
        }
        Ok(byte)
    }

    /// Volgende byte zonder regeltelling.
    pub fn next_raw(&mut self) -> io::Result<Option<u8>> {
        match self.putback.take() {
            Some(byte) => Ok(Some(byte)),
            None => self.fetch(),
        }
    }

    /// Zet één tekstbyte terug; de regeltelling wordt teruggedraaid.
    pub fn unget(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line = self.line.saturating_sub(1);
        }
        self.putback = Some(byte);
    }

    /// Leest precies `len` bytes. `None` als de stroom eerder eindigt.
    pub fn read_exact(&mut self, len: usize) -> io::Result<Option<Vec<u8>>> {
        let mut out = Vec::with_capacity(len.min(1 << 16));
        while out.len() < len {
            match self.next_raw()? {
                Some(byte) => out.push(byte),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// Leest een big-endian geheel getal van `width` bytes.
    pub fn read_be(&mut self, width: usize) -> io::Result<Option<u64>> {
        Ok(self
            .read_exact(width)?
            .map(|bytes| bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_and_restores_on_unget() {
        let mut reader = ByteReader::new(&b"a\nb"[..]);
        assert_eq!(reader.next_byte().unwrap(), Some(b'a'));
        assert_eq!(reader.next_byte().unwrap(), Some(b'\n'));
        assert_eq!(reader.line(), 2);
        reader.unget(b'\n');
        assert_eq!(reader.line(), 1);
        assert_eq!(reader.next_byte().unwrap(), Some(b'\n'));
        assert_eq!(reader.line(), 2);
        assert_eq!(reader.next_byte().unwrap(), Some(b'b'));
        assert_eq!(reader.next_byte().unwrap(), None);
    }

    #[test]
    fn raw_reads_do_not_count_lines() {
        let mut reader = ByteReader::new(&[0x0A, 0x0A, 0x01][..]);
        assert_eq!(reader.read_exact(2).unwrap(), Some(vec![0x0A, 0x0A]));
        assert_eq!(reader.line(), 1);
        assert_eq!(reader.read_be(1).unwrap(), Some(1));
        assert_eq!(reader.read_exact(1).unwrap(), None);
    }
}
