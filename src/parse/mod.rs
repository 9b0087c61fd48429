//! Lezen en schrijven van RIB-stromen.

pub mod decoder;
pub mod lexer;
pub mod reader;
pub mod writer;

pub use decoder::{RibDecoder, StreamItem, decode_bytes, decode_requests};
pub use lexer::Comment;
pub use writer::{Encoding, RibWriter, encode_requests};
