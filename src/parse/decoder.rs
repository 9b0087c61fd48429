//! Zet tokens om in requests met parameterlijsten.
//!
//! Requests hebben geen afsluitteken: de decoder leest één token vooruit en
//! beëindigt een request zodra het volgende request-token verschijnt.
//! Commentaar tussen een request en zijn parameters wordt bewaard en direct
//! na dat request doorgegeven.

use std::collections::VecDeque;
use std::io::Read;

use serde::Serialize;

use super::lexer::{Comment, Lexeme, Lexer, Token};
use crate::scene::{BasicType, ErrorKind, Parameter, Request, RequestKind, RiError, Values};

/// Eén element uit een gedecodeerde stroom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StreamItem {
    Request(Request),
    Comment(Comment),
}

/// Verzamelt de elementen van een `[ ... ]`-array.
#[derive(Debug)]
struct ArrayCollector {
    values: Option<Values>,
    source_type: Option<BasicType>,
    line: usize,
}

impl ArrayCollector {
    fn new(line: usize) -> Self {
        Self {
            values: None,
            source_type: None,
            line,
        }
    }

    fn push(&mut self, item: Values) -> Result<(), RiError> {
        self.source_type.get_or_insert(item.basic_type());
        let Some(values) = self.values.as_mut() else {
            self.values = Some(item);
            return Ok(());
        };
        if values.extend_from(&item) {
            return Ok(());
        }
        // Gehele getallen en floats mengen promoveert de hele array naar floats.
        match (values.to_floats(), item.to_floats()) {
            (Some(mut merged), Some(extra))
                if values.basic_type() != BasicType::String
                    && item.basic_type() != BasicType::String =>
            {
                merged.extend(extra);
                *values = Values::Floats(merged);
                Ok(())
            }
            _ => Err(RiError::new(
                ErrorKind::BadArray,
                format!(
                    "array mixes {} and {} values",
                    values.basic_type().name(),
                    item.basic_type().name()
                ),
            )
            .at_line(self.line)),
        }
    }

    fn finish(self) -> Parameter {
        let values = self.values.unwrap_or(Values::Floats(Vec::new()));
        let mut param = Parameter::new(values, true);
        if let Some(source) = self.source_type {
            param.source_type = source;
        }
        param
    }
}

/// Lui, per bestand herstartbare decoder.
///
/// Levert `Result<StreamItem, RiError>`: een `Err` is een herstelbare melding,
/// tenzij de ernst `Severe` is; daarna levert de iterator niets meer.
pub struct RibDecoder<R> {
    lexer: Lexer<R>,
    lookahead: Option<Lexeme>,
    pending: VecDeque<Result<StreamItem, RiError>>,
    finished: bool,
}

impl<R: Read> RibDecoder<R> {
    pub fn new(source: R) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: None,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn line(&self) -> usize {
        self.lexer.line()
    }

    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, RiError> {
        match self.lookahead.take() {
            Some(lexeme) => Ok(Some(lexeme)),
            None => self.lexer.next_token(),
        }
    }

    /// Slaat tokens over tot het volgende bekende request of het einde.
    /// Onbekende identifiers onderweg worden ook gemeld.
    fn resync(&mut self) {
        loop {
            match self.next_lexeme() {
                Ok(Some(Lexeme {
                    token: Token::Identifier(name),
                    line,
                })) => {
                    if RequestKind::from_name(&name).is_some() {
                        self.lookahead = Some(Lexeme {
                            token: Token::Identifier(name),
                            line,
                        });
                        return;
                    }
                    self.pending.push_back(Err(unknown_request(&name, line)));
                }
                Ok(Some(Lexeme {
                    token: Token::Comment(comment),
                    ..
                })) => self.pending.push_back(Ok(StreamItem::Comment(comment))),
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(err) if err.is_severe() => {
                    self.pending.push_back(Err(err));
                    self.finished = true;
                    return;
                }
                Err(err) => self.pending.push_back(Err(err)),
            }
        }
    }

    /// Leest de parameters van een request tot het volgende identifier.
    fn read_request(&mut self, kind: RequestKind, line: usize) {
        let mut params = Vec::new();
        let mut deferred = Vec::new();
        let mut errors = Vec::new();
        let mut array: Option<ArrayCollector> = None;

        loop {
            let lexeme = match self.next_lexeme() {
                Ok(Some(lexeme)) => lexeme,
                Ok(None) => break,
                Err(err) if err.is_severe() => {
                    errors.push(err);
                    self.finished = true;
                    break;
                }
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };
            let scalar = match lexeme.token {
                Token::Identifier(_) => {
                    self.lookahead = Some(lexeme);
                    break;
                }
                Token::Comment(comment) => {
                    deferred.push(comment);
                    continue;
                }
                Token::ArrayStart => {
                    if array.is_some() {
                        errors.push(
                            RiError::new(ErrorKind::BadArray, "nested array opened")
                                .at_line(lexeme.line),
                        );
                    } else {
                        array = Some(ArrayCollector::new(lexeme.line));
                    }
                    continue;
                }
                Token::ArrayEnd => {
                    match array.take() {
                        Some(collector) => params.push(collector.finish()),
                        None => errors.push(
                            RiError::new(ErrorKind::BadArray, "unmatched ']'")
                                .at_line(lexeme.line),
                        ),
                    }
                    continue;
                }
                Token::FloatArray(values) => {
                    if let Some(collector) = array.as_mut() {
                        if let Err(err) = collector.push(Values::Floats(values)) {
                            errors.push(err);
                        }
                    } else {
                        params.push(Parameter::floats(values));
                    }
                    continue;
                }
                Token::Integer(v) => Values::Integers(vec![v]),
                Token::Float(v) => Values::Floats(vec![v]),
                Token::Str(s) => Values::Strings(vec![s]),
            };
            match array.as_mut() {
                Some(collector) => {
                    if let Err(err) = collector.push(scalar) {
                        errors.push(err);
                    }
                }
                None => params.push(Parameter::new(scalar, false)),
            }
        }

        if let Some(collector) = array {
            errors.push(
                RiError::new(ErrorKind::BadArray, "array is not closed").at_line(collector.line),
            );
        }

        if errors.is_empty() {
            let request = Request {
                kind,
                line,
                params,
            };
            self.pending.push_back(Ok(StreamItem::Request(request)));
        } else {
            log::debug!("line {line}: {} abandoned", kind.name());
            self.pending.extend(errors.into_iter().map(|e| Err(e.at_line(line))));
        }
        self.pending
            .extend(deferred.into_iter().map(|c| Ok(StreamItem::Comment(c))));
    }

    fn fill(&mut self) {
        let lexeme = match self.next_lexeme() {
            Ok(Some(lexeme)) => lexeme,
            Ok(None) => {
                self.finished = true;
                return;
            }
            Err(err) => {
                if err.is_severe() {
                    self.finished = true;
                } else {
                    self.resync();
                }
                self.pending.push_front(Err(err));
                return;
            }
        };
        match lexeme.token {
            Token::Comment(comment) => self.pending.push_back(Ok(StreamItem::Comment(comment))),
            Token::Identifier(name) => match RequestKind::from_name(&name) {
                Some(kind) => self.read_request(kind, lexeme.line),
                None => {
                    self.pending.push_back(Err(unknown_request(&name, lexeme.line)));
                    self.resync();
                }
            },
            _ => {
                self.pending.push_back(Err(RiError::new(
                    ErrorKind::Syntax,
                    "value outside of a request",
                )
                .at_line(lexeme.line)));
                self.resync();
            }
        }
    }
}

impl<R: Read> Iterator for RibDecoder<R> {
    type Item = Result<StreamItem, RiError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() && !self.finished {
            self.fill();
        }
        self.pending.pop_front()
    }
}

fn unknown_request(name: &str, line: usize) -> RiError {
    let message = match RequestKind::suggest(name) {
        Some(hint) => format!("unknown request \"{name}\" (did you mean \"{hint}\"?)"),
        None => format!("unknown request \"{name}\""),
    };
    RiError::new(ErrorKind::Syntax, message).at_line(line)
}

/// Decodeert een volledige stroom in het geheugen.
#[must_use]
pub fn decode_bytes(bytes: &[u8]) -> Vec<Result<StreamItem, RiError>> {
    RibDecoder::new(bytes).collect()
}

/// Alleen de requests van een stroom; meldingen en commentaar vallen weg.
#[must_use]
pub fn decode_requests(bytes: &[u8]) -> Vec<Request> {
    decode_bytes(bytes)
        .into_iter()
        .filter_map(|item| match item {
            Ok(StreamItem::Request(request)) => Some(request),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_requests_on_identifiers() {
        let requests = decode_requests(b"Translate 1 2 3 Sphere 1 -1 1 360");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, RequestKind::Translate);
        assert_eq!(requests[0].params.len(), 3);
        assert_eq!(requests[1].kind, RequestKind::Sphere);
    }

    #[test]
    fn promotes_mixed_numeric_arrays() {
        let requests = decode_requests(b"Color [1 0.5 0]");
        let param = &requests[0].params[0];
        assert_eq!(param.values, Values::Floats(vec![1.0, 0.5, 0.0]));
        assert_eq!(param.source_type, BasicType::Integer);
        assert!(param.is_array);
    }

    #[test]
    fn mixed_string_array_abandons_the_request() {
        let items = decode_bytes(b"Color [1 \"a\"] Sides 2");
        assert!(matches!(&items[0], Err(e) if e.kind == ErrorKind::BadArray));
        assert!(matches!(&items[1], Ok(StreamItem::Request(r)) if r.kind == RequestKind::Sides));
    }

    #[test]
    fn comments_are_deferred_after_their_request() {
        let items = decode_bytes(b"Sphere 1 # note\n -1 1 360\nSides 1");
        assert!(matches!(&items[0], Ok(StreamItem::Request(r)) if r.params.len() == 4));
        assert!(matches!(&items[1], Ok(StreamItem::Comment(c)) if c.text == " note"));
        assert!(matches!(&items[2], Ok(StreamItem::Request(r)) if r.kind == RequestKind::Sides));
    }

    #[test]
    fn unknown_request_resyncs_at_next_known_one() {
        let items = decode_bytes(b"AttributeBegin Frob 1 2 [3] \"x\" AttributeEnd");
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[1], Err(e) if e.kind == ErrorKind::Syntax));
        assert!(
            matches!(&items[2], Ok(StreamItem::Request(r)) if r.kind == RequestKind::AttributeEnd)
        );
    }

    #[test]
    fn unclosed_array_is_reported() {
        let items = decode_bytes(b"Color [1 0 0");
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(e) if e.kind == ErrorKind::BadArray && e.line == Some(1)));
    }
}
