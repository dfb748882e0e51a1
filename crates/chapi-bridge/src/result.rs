//! Single-use carrier for one query result, and its conversion into strings.
//!
//! A [`ResultBuffer`] is created by the bridge right before a query, filled by
//! the engine (or left empty for "not found") and consumed by exactly one of
//! [`to_string`], [`to_units`] or [`to_managed`]. Consumption releases the
//! payload on every path, including when the conversion fails.

use std::fmt;

use crate::error::MarshalError;
use crate::managed::{ManagedEnv, ObjectRef};
use crate::native::ledger::{self, AllocKind};

/// Query payload: UTF-16 code units in native byte order. Length is in bytes.
#[derive(Default)]
pub struct ResultBuffer {
    payload: Option<Vec<u8>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the payload with `units`. An empty slice leaves the buffer empty.
    pub fn fill_units(&mut self, units: &[u16]) -> Result<(), MarshalError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(units.len() * 2)
            .map_err(|_| MarshalError::oom("query result"))?;
        for u in units {
            bytes.extend_from_slice(&u.to_ne_bytes());
        }
        self.set(bytes);
        Ok(())
    }

    /// Replaces the payload with a copy of raw bytes.
    pub fn fill_bytes(&mut self, data: &[u8]) -> Result<(), MarshalError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(data.len())
            .map_err(|_| MarshalError::oom("query result"))?;
        bytes.extend_from_slice(data);
        self.set(bytes);
        Ok(())
    }

    fn set(&mut self, bytes: Vec<u8>) {
        self.release();
        if !bytes.is_empty() {
            ledger::acquire(AllocKind::ResultPayload);
            self.payload = Some(bytes);
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    /// Frees the payload. Calling it on an empty or released buffer does nothing.
    pub fn release(&mut self) {
        if self.payload.take().is_some() {
            ledger::release(AllocKind::ResultPayload);
        }
    }

    /// Decodes the payload into code units; `None` when empty.
    fn decode(&self) -> Result<Option<Vec<u16>>, MarshalError> {
        let bytes = self.bytes();
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() % 2 != 0 {
            tracing::warn!(
                len = bytes.len(),
                "odd-length query result, dropping trailing byte"
            );
        }

        #[cfg(feature = "ffi-trace")]
        tracing::trace!(len = bytes.len(), "decoding query result");

        let mut units = Vec::new();
        units
            .try_reserve_exact(bytes.len() / 2)
            .map_err(|_| MarshalError::oom("query result"))?;
        units.extend(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]])),
        );
        Ok(Some(units))
    }
}

impl Drop for ResultBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ResultBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBuffer")
            .field("len", &self.len())
            .finish()
    }
}

/// Consumes `buffer`, returning its code units or `None` when it is empty.
pub fn to_units(mut buffer: ResultBuffer) -> Result<Option<Vec<u16>>, MarshalError> {
    let out = buffer.decode();
    buffer.release();
    out
}

/// Consumes `buffer`, returning its contents as a Rust string.
/// Unpaired surrogates are replaced.
pub fn to_string(buffer: ResultBuffer) -> Result<Option<String>, MarshalError> {
    Ok(to_units(buffer)?.map(|u| String::from_utf16_lossy(&u)))
}

/// Consumes `buffer`, returning a new managed string or `None` when it is empty.
/// A managed allocation failure is reported as out-of-memory; the buffer is
/// released either way.
pub fn to_managed(
    env: &dyn ManagedEnv,
    buffer: ResultBuffer,
) -> Result<Option<ObjectRef>, MarshalError> {
    match to_units(buffer)? {
        None => Ok(None),
        Some(units) => env
            .new_string(&units)
            .map(Some)
            .ok_or(MarshalError::oom("result string")),
    }
}
