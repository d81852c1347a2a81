//! # Field-Numbered Codec
//!
//! Binary encoding for every persisted and gossiped structure. Each schema is
//! a list of `(fieldNumber, dataType)` pairs encoded with protobuf framing:
//!
//! | dataType | wire type | notes |
//! |----------|-----------|-------|
//! | `uint32`, `uint64`, `boolean` | varint | always written, zero included |
//! | `bytes`, `string` | length-delimited | always written, empty included |
//! | `object` | length-delimited | nested schema |
//! | `array` of bytes/objects | repeated length-delimited | omitted when empty |
//!
//! Decoding is strict: fields must appear in ascending schema order with the
//! declared wire type, and no bytes may follow the last field. A strict
//! decoder guarantees that `decode(encode(x))` re-encodes to identical bytes.

use crate::errors::CodecError;
use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint, WireType};

/// Schema identifiers. Field numbers inside each schema are fixed.
pub mod schema {
    pub const BLOCK: &str = "/block";
    pub const BLOCK_HEADER: &str = "/block/header";
    pub const BLOCK_HEADER_SIGNING: &str = "/block/header/signing";
    pub const BLOCK_HEADER_ASSET_V2: &str = "/blockHeader/asset/v2";
    pub const GENESIS_BLOCK_HEADER_ASSET: &str = "/genesisBlock/header/asset";
    pub const ACCOUNT: &str = "/account/base";
    pub const ACCOUNT_TOKEN: &str = "/account/base/token";
    pub const ACCOUNT_SEQUENCE: &str = "/account/base/sequence";
    pub const ACCOUNT_KEYS: &str = "/account/base/keys";
    pub const ACCOUNT_DPOS: &str = "/account/base/dpos";
    pub const ACCOUNT_DPOS_DELEGATE: &str = "/account/base/dpos/delegate";
    pub const ACCOUNT_DPOS_VOTE: &str = "/account/base/dpos/sentVotes";
    pub const ACCOUNT_DPOS_UNLOCKING: &str = "/account/base/dpos/unlocking";
    pub const STATE_DIFF: &str = "/state/diff";
    pub const STATE_DIFF_ENTRY: &str = "/state/diff/entry";
    pub const STATE_VALIDATORS: &str = "/state/validators";
    pub const STATE_VALIDATOR: &str = "/state/validators/item";
    pub const TRANSACTION: &str = "/transaction";
    pub const CHAIN_STATE_LIST: &str = "/chain/state/list";
}

/// A structure with a fixed field-numbered schema.
pub trait Codec: Sized {
    /// Schema identifier, reported in decoding errors.
    const SCHEMA: &'static str;

    /// Writes every field of `self` in ascending field order.
    fn write_fields(&self, writer: &mut FieldWriter);

    /// Reads every field in ascending field order.
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, CodecError>;

    /// Encodes to bytes.
    fn encode(&self) -> Vec<u8> {
        let mut writer = FieldWriter::new();
        self.write_fields(&mut writer);
        writer.into_bytes()
    }

    /// Decodes from bytes, rejecting trailing data.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(Self::SCHEMA, bytes);
        let value = Self::read_fields(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Appends fields to a buffer.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, field: u32, value: u32) {
        self.write_u64(field, u64::from(value));
    }

    pub fn write_u64(&mut self, field: u32, value: u64) {
        encode_key(field, WireType::Varint, &mut self.buf);
        encode_varint(value, &mut self.buf);
    }

    pub fn write_bool(&mut self, field: u32, value: bool) {
        self.write_u64(field, u64::from(value));
    }

    pub fn write_bytes(&mut self, field: u32, value: &[u8]) {
        encode_key(field, WireType::LengthDelimited, &mut self.buf);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
    }

    pub fn write_string(&mut self, field: u32, value: &str) {
        self.write_bytes(field, value.as_bytes());
    }

    pub fn write_object<T: Codec>(&mut self, field: u32, value: &T) {
        self.write_bytes(field, &value.encode());
    }

    /// Writes one entry per element; nothing when empty.
    pub fn write_repeated_bytes<B: AsRef<[u8]>>(&mut self, field: u32, values: &[B]) {
        for value in values {
            self.write_bytes(field, value.as_ref());
        }
    }

    /// Writes one entry per element; nothing when empty.
    pub fn write_repeated_objects<T: Codec>(&mut self, field: u32, values: &[T]) {
        for value in values {
            self.write_object(field, value);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads fields from a buffer in schema order.
#[derive(Debug)]
pub struct FieldReader<'a> {
    schema: &'static str,
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(schema: &'static str, buf: &'a [u8]) -> Self {
        Self { schema, buf }
    }

    /// Field number of the next key without consuming it.
    fn peek_field(&self) -> Option<u32> {
        let mut peek = self.buf;
        decode_key(&mut peek).ok().map(|(tag, _)| tag)
    }

    fn expect_key(
        &mut self,
        field: u32,
        name: &'static str,
        wire_type: WireType,
    ) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            return Err(CodecError::MissingField {
                schema: self.schema,
                field: name,
            });
        }
        let mut peek = self.buf;
        let (tag, actual) = decode_key(&mut peek).map_err(|e| self.malformed(e))?;
        if tag != field {
            return Err(CodecError::UnexpectedField {
                schema: self.schema,
                field: name,
                expected: field,
                found: tag,
            });
        }
        if actual != wire_type {
            return Err(CodecError::WrongWireType {
                schema: self.schema,
                field: name,
            });
        }
        self.buf = peek;
        Ok(())
    }

    fn malformed(&self, err: impl std::fmt::Display) -> CodecError {
        CodecError::Malformed {
            schema: self.schema,
            message: err.to_string(),
        }
    }

    pub fn read_u64(&mut self, field: u32, name: &'static str) -> Result<u64, CodecError> {
        self.expect_key(field, name, WireType::Varint)?;
        decode_varint(&mut self.buf).map_err(|e| self.malformed(e))
    }

    pub fn read_u32(&mut self, field: u32, name: &'static str) -> Result<u32, CodecError> {
        let value = self.read_u64(field, name)?;
        u32::try_from(value).map_err(|_| CodecError::Overflow {
            schema: self.schema,
            field: name,
        })
    }

    pub fn read_bool(&mut self, field: u32, name: &'static str) -> Result<bool, CodecError> {
        match self.read_u64(field, name)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::InvalidBoolean {
                schema: self.schema,
                field: name,
            }),
        }
    }

    pub fn read_bytes(&mut self, field: u32, name: &'static str) -> Result<Vec<u8>, CodecError> {
        self.expect_key(field, name, WireType::LengthDelimited)?;
        let len = decode_varint(&mut self.buf).map_err(|e| self.malformed(e))?;
        let len = usize::try_from(len).map_err(|e| self.malformed(e))?;
        if len > self.buf.len() {
            return Err(self.malformed(format!("length {len} exceeds remaining input")));
        }
        let buf: &'a [u8] = self.buf;
        let (value, rest) = buf.split_at(len);
        self.buf = rest;
        Ok(value.to_vec())
    }

    /// Reads a byte field that must have exactly `N` bytes.
    pub fn read_fixed<const N: usize>(
        &mut self,
        field: u32,
        name: &'static str,
    ) -> Result<[u8; N], CodecError> {
        let bytes = self.read_bytes(field, name)?;
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| CodecError::InvalidLength {
            schema: self.schema,
            field: name,
            expected: N,
            actual: bytes.len(),
        })
    }

    pub fn read_string(&mut self, field: u32, name: &'static str) -> Result<String, CodecError> {
        let bytes = self.read_bytes(field, name)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 {
            schema: self.schema,
            field: name,
        })
    }

    pub fn read_object<T: Codec>(
        &mut self,
        field: u32,
        name: &'static str,
    ) -> Result<T, CodecError> {
        let bytes = self.read_bytes(field, name)?;
        T::decode(&bytes)
    }

    pub fn read_repeated_bytes(
        &mut self,
        field: u32,
        name: &'static str,
    ) -> Result<Vec<Vec<u8>>, CodecError> {
        let mut values = Vec::new();
        while self.peek_field() == Some(field) {
            values.push(self.read_bytes(field, name)?);
        }
        Ok(values)
    }

    pub fn read_repeated_objects<T: Codec>(
        &mut self,
        field: u32,
        name: &'static str,
    ) -> Result<Vec<T>, CodecError> {
        let mut values = Vec::new();
        while self.peek_field() == Some(field) {
            values.push(self.read_object(field, name)?);
        }
        Ok(values)
    }

    /// Fails if any bytes remain.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                schema: self.schema,
            })
        }
    }
}
