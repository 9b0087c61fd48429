//! Schrijft requests terug naar een RIB-stroom, als tekst of binair.

use std::collections::HashMap;
use std::io::{self, Write};

use super::lexer::{opcode, Comment};
use crate::scene::{Parameter, Request, RequestKind, Values};

/// Codering van de uitvoerstroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Binary,
}

/// Strings vanaf deze lengte worden in binaire modus eenmalig gedefinieerd
/// en daarna via hun id aangeroepen.
const MIN_INTERNED_LEN: usize = 2;

pub struct RibWriter<W: Write> {
    out: W,
    encoding: Encoding,
    request_codes: HashMap<RequestKind, u8>,
    strings: HashMap<String, u16>,
}

impl<W: Write> RibWriter<W> {
    pub fn new(out: W, encoding: Encoding) -> Self {
        Self {
            out,
            encoding,
            request_codes: HashMap::new(),
            strings: HashMap::new(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_request(&mut self, request: &Request) -> io::Result<()> {
        match self.encoding {
            Encoding::Ascii => {
                self.out.write_all(request.kind.name().as_bytes())?;
                for param in &request.params {
                    self.out.write_all(b" ")?;
                    self.ascii_param(param)?;
                }
                self.out.write_all(b"\n")
            }
            Encoding::Binary => {
                self.binary_request(request.kind)?;
                for param in &request.params {
                    self.binary_param(param)?;
                }
                Ok(())
            }
        }
    }

    /// Commentaar blijft in beide coderingen tekst.
    pub fn write_comment(&mut self, comment: &Comment) -> io::Result<()> {
        let marker: &[u8] = if comment.structured { b"##" } else { b"#" };
        self.out.write_all(marker)?;
        self.out.write_all(comment.text.as_bytes())?;
        self.out.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn ascii_param(&mut self, param: &Parameter) -> io::Result<()> {
        if param.is_array {
            self.out.write_all(b"[")?;
        }
        let mut first = true;
        let mut sep = |out: &mut W| -> io::Result<()> {
            if !first {
                out.write_all(b" ")?;
            }
            first = false;
            Ok(())
        };
        match &param.values {
            Values::Integers(values) => {
                for v in values {
                    sep(&mut self.out)?;
                    write!(self.out, "{v}")?;
                }
            }
            Values::Floats(values) => {
                for v in values {
                    sep(&mut self.out)?;
                    self.out.write_all(format_float(*v).as_bytes())?;
                }
            }
            Values::Strings(values) => {
                for v in values {
                    sep(&mut self.out)?;
                    self.out.write_all(quote(v).as_bytes())?;
                }
            }
        }
        if param.is_array {
            self.out.write_all(b"]")?;
        }
        Ok(())
    }

    fn binary_request(&mut self, kind: RequestKind) -> io::Result<()> {
        if let Some(code) = self.request_codes.get(&kind) {
            return self.out.write_all(&[opcode::REQUEST, *code]);
        }
        let Ok(code) = u8::try_from(self.request_codes.len()) else {
            // Alle codes in gebruik: val terug op de naam.
            self.out.write_all(kind.name().as_bytes())?;
            return self.out.write_all(b" ");
        };
        self.out.write_all(&[opcode::DEFINE_REQUEST, code])?;
        self.binary_literal(kind.name())?;
        self.request_codes.insert(kind, code);
        self.out.write_all(&[opcode::REQUEST, code])
    }

    fn binary_param(&mut self, param: &Parameter) -> io::Result<()> {
        match &param.values {
            Values::Floats(values) if param.is_array => {
                let len = values.len() as u64;
                let width = be_width(len);
                self.out.write_all(&[opcode::FLOAT_ARRAY_FIRST + (width as u8 - 1)])?;
                self.out.write_all(&len.to_be_bytes()[8 - width..])?;
                for v in values {
                    self.out.write_all(&v.to_be_bytes())?;
                }
                Ok(())
            }
            Values::Floats(values) => {
                for v in values {
                    self.out.write_all(&[opcode::FLOAT32])?;
                    self.out.write_all(&v.to_be_bytes())?;
                }
                Ok(())
            }
            Values::Integers(values) => {
                self.bracket(param.is_array, |w| {
                    values.iter().try_for_each(|v| w.binary_int(*v))
                })
            }
            Values::Strings(values) => {
                self.bracket(param.is_array, |w| {
                    values.iter().try_for_each(|v| w.binary_string(v))
                })
            }
        }
    }

    fn bracket(
        &mut self,
        is_array: bool,
        body: impl FnOnce(&mut Self) -> io::Result<()>,
    ) -> io::Result<()> {
        if is_array {
            self.out.write_all(b"[")?;
        }
        body(self)?;
        if is_array {
            self.out.write_all(b"]")?;
        }
        Ok(())
    }

    /// Geheel getal als fixed-point zonder fractie, in de kleinste breedte.
    fn binary_int(&mut self, value: i32) -> io::Result<()> {
        let width = (1..=4usize)
            .find(|w| {
                let bits = 8 * *w as u32;
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                (min..=max).contains(&i64::from(value))
            })
            .unwrap_or(4);
        self.out
            .write_all(&[opcode::FIXED_FIRST + (width - 1) as u8])?;
        self.out.write_all(&value.to_be_bytes()[4 - width..])
    }

    fn binary_string(&mut self, value: &str) -> io::Result<()> {
        if value.len() < MIN_INTERNED_LEN {
            return self.binary_literal(value);
        }
        if let Some(id) = self.strings.get(value).copied() {
            return self.string_ref(id);
        }
        let Ok(id) = u16::try_from(self.strings.len()) else {
            return self.binary_literal(value);
        };
        if id <= 0xff {
            self.out.write_all(&[opcode::DEFINE_STRING_1, id as u8])?;
        } else {
            self.out.write_all(&[opcode::DEFINE_STRING_2])?;
            self.out.write_all(&id.to_be_bytes())?;
        }
        self.binary_literal(value)?;
        self.strings.insert(value.to_owned(), id);
        self.string_ref(id)
    }

    fn string_ref(&mut self, id: u16) -> io::Result<()> {
        if id <= 0xff {
            self.out.write_all(&[opcode::STRING_REF_1, id as u8])
        } else {
            self.out.write_all(&[opcode::STRING_REF_2])?;
            self.out.write_all(&id.to_be_bytes())
        }
    }

    fn binary_literal(&mut self, value: &str) -> io::Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() < 16 {
            self.out
                .write_all(&[opcode::SHORT_STRING_FIRST + bytes.len() as u8])?;
        } else {
            let len = bytes.len() as u64;
            let width = be_width(len);
            self.out
                .write_all(&[opcode::LONG_STRING_FIRST + (width as u8 - 1)])?;
            self.out.write_all(&len.to_be_bytes()[8 - width..])?;
        }
        self.out.write_all(bytes)
    }
}

/// Aantal bytes (1..=4) om `len` big-endian op te slaan.
fn be_width(len: u64) -> usize {
    match len {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xff_ffff => 3,
        _ => 4,
    }
}

/// Kortste decimale vorm die als float teruggelezen wordt.
fn format_float(value: f32) -> String {
    if value.is_finite() {
        format!("{value:?}")
    } else {
        log::warn!("non-finite float {value} written as 0");
        "0".to_owned()
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Codeert een reeks requests in één keer.
pub fn encode_requests(requests: &[Request], encoding: Encoding) -> io::Result<Vec<u8>> {
    let mut writer = RibWriter::new(Vec::new(), encoding);
    for request in requests {
        writer.write_request(request)?;
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::decoder::decode_requests;

    fn sphere() -> Request {
        Request::new(
            RequestKind::Sphere,
            vec![
                Parameter::float(1.0),
                Parameter::float(-1.0),
                Parameter::float(1.0),
                Parameter::float(360.0),
            ],
        )
    }

    #[test]
    fn ascii_output_is_readable() {
        let request = Request::new(
            RequestKind::Attribute,
            vec![
                Parameter::string("identifier"),
                Parameter::string("name"),
                Parameter::strings(vec!["a \"b\"".into()]),
            ],
        );
        let bytes = encode_requests(&[request], Encoding::Ascii).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Attribute \"identifier\" \"name\" [\"a \\\"b\\\"\"]\n"
        );
    }

    #[test]
    fn full_sink_reports_write_errors() {
        let mut buf = [0u8; 4];
        let mut writer = RibWriter::new(&mut buf[..], Encoding::Ascii);
        let err = writer.write_request(&sphere()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert!(encode_requests(&[sphere()], Encoding::Ascii).is_ok());
    }

    #[test]
    fn binary_sphere_uses_request_definition() {
        let bytes = encode_requests(&[sphere(), sphere()], Encoding::Binary).unwrap();
        assert_eq!(bytes[0], opcode::DEFINE_REQUEST);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2], opcode::SHORT_STRING_FIRST + 6);
        let decoded = decode_requests(&bytes);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].kind, RequestKind::Sphere);
        assert_eq!(decoded[1].params, sphere().params);
    }

    #[test]
    fn binary_ints_pick_smallest_width() {
        let request = Request::new(
            RequestKind::Sides,
            vec![Parameter::ints(vec![1, -200, 70_000])],
        );
        let bytes = encode_requests(&[request.clone()], Encoding::Binary).unwrap();
        let decoded = decode_requests(&bytes);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].params, request.params);
    }

    #[test]
    fn binary_ints_use_width_opcodes() {
        let request = Request::new(RequestKind::Sides, vec![Parameter::int(256)]);
        let bytes = encode_requests(&[request], Encoding::Binary).unwrap();
        assert!(bytes.ends_with(&[0o201, 0x01, 0x00]), "{bytes:?}");
    }

    #[test]
    fn be_width_covers_all_sizes() {
        assert_eq!(be_width(0), 1);
        assert_eq!(be_width(256), 2);
        assert_eq!(be_width(70_000), 3);
        assert_eq!(be_width(1 << 30), 4);
    }
}
