// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! Big-endian packing primitives for TPM structures.

use crate::error::MarshalError;

/// Growable buffer for building TPM structures.
#[derive(Debug, Default)]
pub struct TpmWriter {
    data: Vec<u8>,
}

impl TpmWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Puts a TPM2B structure, i.e. a two byte size followed by the data.
    ///
    /// # Errors
    ///
    /// Returns `MarshalError::Capacity` if the data does not fit a `u16` size.
    pub fn put_tpm2b(&mut self, data: &[u8]) -> Result<(), MarshalError> {
        let size = u16::try_from(data.len()).map_err(|_| MarshalError::Capacity(data.len()))?;
        self.put_u16(size);
        self.put_bytes(data);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Cursor for parsing TPM structures out of a byte slice.
#[derive(Debug)]
pub struct TpmReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TpmReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MarshalError> {
        if len > self.remaining() {
            return Err(MarshalError::Underflow {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// # Errors
    ///
    /// Returns `MarshalError::Underflow` if the buffer is exhausted.
    pub fn get_u8(&mut self) -> Result<u8, MarshalError> {
        Ok(self.take(1)?[0])
    }

    /// # Errors
    ///
    /// Returns `MarshalError::Underflow` if the buffer is exhausted.
    pub fn get_u16(&mut self) -> Result<u16, MarshalError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// # Errors
    ///
    /// Returns `MarshalError::Underflow` if the buffer is exhausted.
    pub fn get_u32(&mut self) -> Result<u32, MarshalError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// # Errors
    ///
    /// Returns `MarshalError::Underflow` if fewer than `len` bytes remain.
    pub fn get_bytes(&mut self, len: usize) -> Result<Vec<u8>, MarshalError> {
        Ok(self.take(len)?.to_vec())
    }

    /// Gets a TPM2B structure (two byte size prefix and data).
    ///
    /// # Errors
    ///
    /// Returns `MarshalError::Underflow` if the declared size exceeds the
    /// remaining bytes.
    pub fn get_tpm2b(&mut self) -> Result<Vec<u8>, MarshalError> {
        let size = self.get_u16()? as usize;
        self.get_bytes(size)
    }
}

/// Types that can be marshalled into TPM wire format.
pub trait TpmBuild {
    /// # Errors
    ///
    /// Returns a `MarshalError` if the value cannot be represented on the wire.
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError>;
}

/// Types that can be unmarshalled from TPM wire format.
pub trait TpmParse: Sized {
    /// # Errors
    ///
    /// Returns a `MarshalError` if the input is truncated or malformed.
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError>;
}

/// A helper to build a `TpmBuild` type into a `Vec<u8>`.
///
/// # Errors
///
/// Returns a `MarshalError` if the object cannot be serialized.
pub fn build_to_vec<T: TpmBuild + ?Sized>(obj: &T) -> Result<Vec<u8>, MarshalError> {
    let mut writer = TpmWriter::new();
    obj.build(&mut writer)?;
    Ok(writer.into_vec())
}

/// A helper to parse a `TpmParse` type out of a byte slice, ignoring any
/// trailing data.
///
/// # Errors
///
/// Returns a `MarshalError` if the bytes cannot be parsed.
pub fn parse_from_slice<T: TpmParse>(bytes: &[u8]) -> Result<T, MarshalError> {
    T::parse(&mut TpmReader::new(bytes))
}
