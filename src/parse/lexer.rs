//! Tokenizer voor RIB-stromen: tekst en binair door elkaar.
//!
//! De tekstlexer is een toestandsmachine per teken. Bytes vanaf `0o200`
//! schakelen naar de binaire codering; definities van request-codes en
//! strings worden per stroom bijgehouden.

use std::collections::HashMap;
use std::io::Read;

use serde::Serialize;

use super::reader::ByteReader;
use crate::scene::{ErrorKind, RiError, Severity};

/// Binaire opcodes.
pub mod opcode {
    pub const FIXED_FIRST: u8 = 0o200;
    pub const FIXED_LAST: u8 = 0o217;
    pub const SHORT_STRING_FIRST: u8 = 0o220;
    pub const SHORT_STRING_LAST: u8 = 0o237;
    pub const LONG_STRING_FIRST: u8 = 0o240;
    pub const LONG_STRING_LAST: u8 = 0o243;
    pub const FLOAT32: u8 = 0o244;
    pub const FLOAT64: u8 = 0o245;
    pub const REQUEST: u8 = 0o246;
    pub const FLOAT_ARRAY_FIRST: u8 = 0o310;
    pub const FLOAT_ARRAY_LAST: u8 = 0o313;
    pub const DEFINE_REQUEST: u8 = 0o314;
    pub const DEFINE_STRING_1: u8 = 0o315;
    pub const DEFINE_STRING_2: u8 = 0o316;
    pub const STRING_REF_1: u8 = 0o317;
    pub const STRING_REF_2: u8 = 0o320;
}

/// Commentaarregel; `structured` voor `##`-commentaar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub text: String,
    pub structured: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    Integer(i32),
    Float(f32),
    Str(String),
    ArrayStart,
    ArrayEnd,
    /// Binaire float-array; gedraagt zich als `[ ... ]`.
    FloatArray(Vec<f32>),
    Comment(Comment),
}

/// Token met de regel waarop het begon.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Identifier,
    IntDigits,
    FracDigits,
    ExpDigits,
    CommentHash,
    StructuredComment,
    PlainComment,
    String,
    StringEscape,
    Octal2,
    Octal3,
}

pub struct Lexer<R> {
    reader: ByteReader<R>,
    request_codes: HashMap<u8, String>,
    strings: HashMap<u16, String>,
    text: Vec<u8>,
}

impl<R: Read> Lexer<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: ByteReader::new(source),
            request_codes: HashMap::new(),
            strings: HashMap::new(),
            text: Vec::new(),
        }
    }

    pub fn line(&self) -> usize {
        self.reader.line()
    }

    fn read(&mut self) -> Result<Option<u8>, RiError> {
        self.reader.next_byte().map_err(io_error)
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.text).into_owned();
        self.text.clear();
        text
    }

    /// Volgende token, of `None` aan het einde van de stroom.
    pub fn next_token(&mut self) -> Result<Option<Lexeme>, RiError> {
        let mut state = State::Idle;
        let mut line = self.reader.line();
        let mut octal: u32 = 0;
        self.text.clear();

        loop {
            let byte = self.read()?;
            match state {
                State::Idle => {
                    let Some(b) = byte else {
                        return Ok(None);
                    };
                    line = self.reader.line();
                    match b {
                        b' ' | b'\t' | b'\r' | b'\n' | 0x0c | 0 => {}
                        b'[' => return Ok(Some(Lexeme { token: Token::ArrayStart, line })),
                        b']' => return Ok(Some(Lexeme { token: Token::ArrayEnd, line })),
                        b'"' => state = State::String,
                        b'#' => state = State::CommentHash,
                        b'-' | b'+' | b'0'..=b'9' => {
                            self.text.push(b);
                            state = State::IntDigits;
                        }
                        b'.' => {
                            self.text.push(b);
                            state = State::FracDigits;
                        }
                        b if b.is_ascii_alphabetic() || b == b'_' => {
                            self.text.push(b);
                            state = State::Identifier;
                        }
                        b if b >= opcode::FIXED_FIRST => {
                            if let Some(token) = self.binary(b, line)? {
                                return Ok(Some(Lexeme { token, line }));
                            }
                        }
                        other => {
                            return Err(RiError::new(
                                ErrorKind::BadToken,
                                format!("unexpected character {:?}", char::from(other)),
                            )
                            .at_line(line));
                        }
                    }
                }
                State::Identifier => match byte {
                    Some(b) if b.is_ascii_alphanumeric() || b == b'_' => self.text.push(b),
                    other => {
                        self.putback(other);
                        let name = self.take_text();
                        return Ok(Some(Lexeme { token: Token::Identifier(name), line }));
                    }
                },
                State::IntDigits => match byte {
                    Some(b @ b'0'..=b'9') => self.text.push(b),
                    Some(b'.') => {
                        self.text.push(b'.');
                        state = State::FracDigits;
                    }
                    Some(b @ (b'e' | b'E')) => {
                        self.text.push(b);
                        state = State::ExpDigits;
                    }
                    other => {
                        self.putback(other);
                        return self.finish_number(line).map(Some);
                    }
                },
                State::FracDigits => match byte {
                    Some(b @ b'0'..=b'9') => self.text.push(b),
                    Some(b @ (b'e' | b'E')) => {
                        self.text.push(b);
                        state = State::ExpDigits;
                    }
                    other => {
                        self.putback(other);
                        return self.finish_number(line).map(Some);
                    }
                },
                State::ExpDigits => match byte {
                    Some(b @ b'0'..=b'9') => self.text.push(b),
                    Some(b @ (b'+' | b'-'))
                        if matches!(self.text.last(), Some(b'e' | b'E')) =>
                    {
                        self.text.push(b);
                    }
                    other => {
                        self.putback(other);
                        return self.finish_number(line).map(Some);
                    }
                },
                State::CommentHash => match byte {
                    Some(b'#') => state = State::StructuredComment,
                    Some(b'\n') | None => return Ok(Some(self.comment(false, line))),
                    Some(b) => {
                        self.text.push(b);
                        state = State::PlainComment;
                    }
                },
                State::StructuredComment | State::PlainComment => match byte {
                    Some(b'\n') | None => {
                        let structured = state == State::StructuredComment;
                        return Ok(Some(self.comment(structured, line)));
                    }
                    Some(b) => self.text.push(b),
                },
                State::String => match byte {
                    Some(b'"') => {
                        let text = self.take_text();
                        return Ok(Some(Lexeme { token: Token::Str(text), line }));
                    }
                    Some(b'\\') => state = State::StringEscape,
                    Some(b) => self.text.push(b),
                    None => return Err(unterminated_string(line)),
                },
                State::StringEscape => {
                    state = State::String;
                    match byte {
                        Some(b'n') => self.text.push(b'\n'),
                        Some(b'r') => self.text.push(b'\r'),
                        Some(b't') => self.text.push(b'\t'),
                        Some(b'b') => self.text.push(0x08),
                        Some(b'f') => self.text.push(0x0c),
                        Some(b'\n') => {}
                        Some(d @ b'0'..=b'7') => {
                            octal = u32::from(d - b'0');
                            state = State::Octal2;
                        }
                        Some(b) => self.text.push(b),
                        None => return Err(unterminated_string(line)),
                    }
                }
                State::Octal2 | State::Octal3 => match byte {
                    Some(d @ b'0'..=b'7') => {
                        octal = octal * 8 + u32::from(d - b'0');
                        if state == State::Octal2 {
                            state = State::Octal3;
                        } else {
                            self.text.push((octal & 0xff) as u8);
                            state = State::String;
                        }
                    }
                    Some(b) => {
                        self.text.push((octal & 0xff) as u8);
                        self.reader.unget(b);
                        state = State::String;
                    }
                    None => return Err(unterminated_string(line)),
                },
            }
        }
    }

    fn putback(&mut self, byte: Option<u8>) {
        if let Some(b) = byte {
            self.reader.unget(b);
        }
    }

    fn comment(&mut self, structured: bool, line: usize) -> Lexeme {
        let mut text = self.take_text();
        if text.ends_with('\r') {
            text.pop();
        }
        Lexeme {
            token: Token::Comment(Comment {
                text,
                structured,
                line,
            }),
            line,
        }
    }

    fn finish_number(&mut self, line: usize) -> Result<Lexeme, RiError> {
        let text = self.take_text();
        let malformed = || {
            RiError::new(ErrorKind::BadToken, format!("malformed number \"{text}\"")).at_line(line)
        };
        let is_float = text.contains(['.', 'e', 'E']);
        let token = if is_float {
            Token::Float(text.parse::<f32>().map_err(|_| malformed())?)
        } else {
            match text.parse::<i32>() {
                Ok(value) => Token::Integer(value),
                Err(_) => Token::Float(text.parse::<f32>().map_err(|_| malformed())?),
            }
        };
        Ok(Lexeme { token, line })
    }

    fn payload(&mut self, len: usize, line: usize) -> Result<Vec<u8>, RiError> {
        self.reader
            .read_exact(len)
            .map_err(io_error)?
            .ok_or_else(|| truncated(line))
    }

    fn payload_be(&mut self, width: usize, line: usize) -> Result<u64, RiError> {
        self.reader
            .read_be(width)
            .map_err(io_error)?
            .ok_or_else(|| truncated(line))
    }

    /// Verwerkt één binaire opcode. `None` voor definities en gereserveerde
    /// codes, die geen token opleveren.
    fn binary(&mut self, op: u8, line: usize) -> Result<Option<Token>, RiError> {
        let token = match op {
            opcode::FIXED_FIRST..=opcode::FIXED_LAST => {
                let code = op - opcode::FIXED_FIRST;
                // Laagste twee bits: breedte - 1; daarboven: fractiebytes.
                let width = usize::from(code & 3) + 1;
                let frac = u32::from(code >> 2);
                let value = sign_extend(self.payload_be(width, line)?, width);
                if frac == 0 {
                    Token::Integer(value as i32)
                } else {
                    Token::Float((value as f64 / f64::from(1u32 << (8 * frac))) as f32)
                }
            }
            opcode::SHORT_STRING_FIRST..=opcode::SHORT_STRING_LAST => {
                let len = usize::from(op - opcode::SHORT_STRING_FIRST);
                Token::Str(string_from(self.payload(len, line)?))
            }
            opcode::LONG_STRING_FIRST..=opcode::LONG_STRING_LAST => {
                let width = usize::from(op - opcode::LONG_STRING_FIRST) + 1;
                let len = self.payload_be(width, line)?;
                let len = usize::try_from(len).map_err(|_| truncated(line))?;
                Token::Str(string_from(self.payload(len, line)?))
            }
            opcode::FLOAT32 => {
                let bytes = self.payload(4, line)?;
                Token::Float(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            opcode::FLOAT64 => {
                let bytes = self.payload(8, line)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes);
                Token::Float(f64::from_be_bytes(raw) as f32)
            }
            opcode::REQUEST => {
                let code = self.payload(1, line)?[0];
                match self.request_codes.get(&code) {
                    Some(name) => Token::Identifier(name.clone()),
                    None => {
                        return Err(RiError::new(
                            ErrorKind::Consistency,
                            format!("request code {code} used before it was defined"),
                        )
                        .at_line(line));
                    }
                }
            }
            opcode::FLOAT_ARRAY_FIRST..=opcode::FLOAT_ARRAY_LAST => {
                let width = usize::from(op - opcode::FLOAT_ARRAY_FIRST) + 1;
                let count = self.payload_be(width, line)?;
                let count = usize::try_from(count).map_err(|_| truncated(line))?;
                let bytes = self.payload(count.saturating_mul(4), line)?;
                Token::FloatArray(
                    bytes
                        .chunks_exact(4)
                        .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                        .collect(),
                )
            }
            opcode::DEFINE_REQUEST => {
                let code = self.payload(1, line)?[0];
                let name = self.definition_string(line)?;
                crate::debug_log!("request code {code} defined as {name}");
                self.request_codes.insert(code, name);
                return Ok(None);
            }
            opcode::DEFINE_STRING_1 | opcode::DEFINE_STRING_2 => {
                let width = if op == opcode::DEFINE_STRING_1 { 1 } else { 2 };
                let id = self.payload_be(width, line)? as u16;
                let text = self.definition_string(line)?;
                self.strings.insert(id, text);
                return Ok(None);
            }
            opcode::STRING_REF_1 | opcode::STRING_REF_2 => {
                let width = if op == opcode::STRING_REF_1 { 1 } else { 2 };
                let id = self.payload_be(width, line)? as u16;
                match self.strings.get(&id) {
                    Some(text) => Token::Str(text.clone()),
                    None => {
                        return Err(RiError::new(
                            ErrorKind::Consistency,
                            format!("string id {id} used before it was defined"),
                        )
                        .at_line(line));
                    }
                }
            }
            reserved => {
                log::debug!("line {line}: reserved opcode {reserved:#o} skipped");
                return Ok(None);
            }
        };
        Ok(Some(token))
    }

    fn definition_string(&mut self, line: usize) -> Result<String, RiError> {
        match self.next_token()? {
            Some(Lexeme {
                token: Token::Str(text),
                ..
            }) => Ok(text),
            Some(_) => Err(RiError::new(
                ErrorKind::Syntax,
                "binary definition is not followed by a string",
            )
            .at_line(line)),
            None => Err(truncated(line)),
        }
    }
}

fn sign_extend(raw: u64, width: usize) -> i64 {
    let shift = 64 - 8 * width as u32;
    ((raw << shift) as i64) >> shift
}

fn string_from(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

fn io_error(err: std::io::Error) -> RiError {
    RiError::new(ErrorKind::System, format!("stream read failed: {err}")).with_severity(Severity::Severe)
}

fn truncated(line: usize) -> RiError {
    RiError::new(ErrorKind::Syntax, "stream ends inside a binary token").at_line(line)
}

fn unterminated_string(line: usize) -> RiError {
    RiError::new(ErrorKind::Syntax, "unterminated string").at_line(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(lexeme) = lexer.next_token().unwrap() {
            out.push(lexeme.token);
        }
        out
    }

    #[test]
    fn lexes_text_tokens() {
        let out = tokens(b"Sphere 1 -1.5 .5e1 [ \"a\\tb\" ] 2E-1");
        assert_eq!(
            out,
            vec![
                Token::Identifier("Sphere".into()),
                Token::Integer(1),
                Token::Float(-1.5),
                Token::Float(5.0),
                Token::ArrayStart,
                Token::Str("a\tb".into()),
                Token::ArrayEnd,
                Token::Float(0.2),
            ]
        );
    }

    #[test]
    fn lexes_octal_escapes_and_comments() {
        let out = tokens(b"\"\\101\\60x\" # plain\n##RenderMan RIB\n");
        assert_eq!(out[0], Token::Str("A0x".into()));
        assert_eq!(
            out[1],
            Token::Comment(Comment {
                text: " plain".into(),
                structured: false,
                line: 1
            })
        );
        assert_eq!(
            out[2],
            Token::Comment(Comment {
                text: "RenderMan RIB".into(),
                structured: true,
                line: 2
            })
        );
    }

    #[test]
    fn tracks_token_lines() {
        let mut lexer = Lexer::new(&b"a\n\nb"[..]);
        assert_eq!(lexer.next_token().unwrap().unwrap().line, 1);
        assert_eq!(lexer.next_token().unwrap().unwrap().line, 3);
    }

    #[test]
    fn decodes_fixed_point_numbers() {
        // 2 bytes, 1 fractional byte: 0x0180 / 256 = 1.5
        let out = tokens(&[0o205, 0x01, 0x80, 0o200, 0xff]);
        assert_eq!(out, vec![Token::Float(1.5), Token::Integer(-1)]);
    }

    #[test]
    fn fixed_point_width_sits_in_the_low_bits() {
        // 0o201: 2 bytes, no fraction. 0o211: 2 bytes, 2 fractional bytes.
        let out = tokens(&[0o201, 0x01, 0x00, 0o211, 0x80, 0x00, 0o214, 0x40]);
        assert_eq!(
            out,
            vec![Token::Integer(256), Token::Float(-0.5), Token::Float(0.25 / 65536.0)]
        );
    }

    #[test]
    fn decodes_binary_strings_and_definitions() {
        let mut input = vec![opcode::DEFINE_REQUEST, 7, 0o220 + 6];
        input.extend_from_slice(b"Sphere");
        input.extend_from_slice(&[opcode::DEFINE_STRING_1, 3, 0o220 + 1, b'P']);
        input.extend_from_slice(&[opcode::REQUEST, 7, opcode::STRING_REF_1, 3]);
        input.extend_from_slice(&[opcode::FLOAT32]);
        input.extend_from_slice(&2.5f32.to_be_bytes());
        input.extend_from_slice(&[0o260]);
        assert_eq!(
            tokens(&input),
            vec![
                Token::Identifier("Sphere".into()),
                Token::Str("P".into()),
                Token::Float(2.5),
            ]
        );
    }

    #[test]
    fn undefined_string_reference_is_an_error() {
        let mut lexer = Lexer::new(&[opcode::STRING_REF_2, 0, 9][..]);
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }

    #[test]
    fn decodes_packed_float_arrays() {
        let mut input = vec![opcode::FLOAT_ARRAY_FIRST, 2];
        input.extend_from_slice(&1.0f32.to_be_bytes());
        input.extend_from_slice(&(-2.0f32).to_be_bytes());
        assert_eq!(tokens(&input), vec![Token::FloatArray(vec![1.0, -2.0])]);
    }
}
