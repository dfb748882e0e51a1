//! Length-prefixed UTF-16 encoding used by registry query results.
//!
//! A payload is a sequence of elements. Each element is one code unit holding
//! the element's size in bytes (`units * 2`), followed by the element's units.
//! Handlers are serialized as an element whose body is itself a payload of
//! `[id, suite_id (hex), class_name, registration_method (hex)]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::SuiteId;

/// Largest element whose byte size still fits the one-unit prefix.
pub const MAX_ELEMENT_UNITS: usize = (u16::MAX / 2) as usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("element of {units} code units does not fit a length prefix")]
    ElementTooLong { units: usize },

    #[error("element at unit {offset} declares {declared} units but only {available} remain")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("malformed hex component {0:?}")]
    BadNumber(String),
}

/// Appends one length-prefixed element to `out`.
pub fn push_element(out: &mut Vec<u16>, element: &[u16]) -> Result<(), WireError> {
    if element.len() > MAX_ELEMENT_UNITS {
        return Err(WireError::ElementTooLong {
            units: element.len(),
        });
    }
    out.reserve(element.len() + 1);
    out.push((element.len() * 2) as u16);
    out.extend_from_slice(element);
    Ok(())
}

pub fn encode_strings<S: AsRef<str>>(items: &[S]) -> Result<Vec<u16>, WireError> {
    let mut out = Vec::new();
    for item in items {
        let units: Vec<u16> = item.as_ref().encode_utf16().collect();
        push_element(&mut out, &units)?;
    }
    Ok(out)
}

/// Splits a payload into borrowed element bodies.
pub fn split_elements(payload: &[u16]) -> Result<Vec<&[u16]>, WireError> {
    let mut elements = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let declared = usize::from(payload[pos]) / 2;
        let start = pos + 1;
        let available = payload.len() - start;
        if declared > available {
            return Err(WireError::Truncated {
                offset: pos,
                declared,
                available,
            });
        }
        elements.push(&payload[start..start + declared]);
        pos = start + declared;
    }
    Ok(elements)
}

pub fn decode_strings(payload: &[u16]) -> Result<Vec<String>, WireError> {
    Ok(split_elements(payload)?
        .into_iter()
        .map(String::from_utf16_lossy)
        .collect())
}

/// Main identity fields of a registered handler as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub id: String,
    pub suite_id: SuiteId,
    pub class_name: String,
    pub registration_method: i32,
}

impl HandlerSummary {
    /// Decodes one serialized handler. Missing components or an empty id
    /// mean "no handler" rather than an error.
    pub fn decode(units: &[u16]) -> Result<Option<Self>, WireError> {
        let parts = decode_strings(units)?;
        let [id, suite, class_name, method, ..] = parts.as_slice() else {
            return Ok(None);
        };
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            id: id.clone(),
            suite_id: SuiteId(parse_hex(suite)?),
            class_name: class_name.clone(),
            registration_method: parse_hex(method)?,
        }))
    }

    /// Decodes a payload of serialized handlers, skipping the ones that
    /// carry no identity.
    pub fn decode_list(payload: &[u16]) -> Result<Vec<Self>, WireError> {
        let mut out = Vec::new();
        for element in split_elements(payload)? {
            if let Some(h) = Self::decode(element)? {
                out.push(h);
            }
        }
        Ok(out)
    }

    pub fn encode(&self) -> Result<Vec<u16>, WireError> {
        encode_strings(&[
            self.id.clone(),
            format_hex(self.suite_id.0),
            self.class_name.clone(),
            format_hex(self.registration_method),
        ])
    }
}

fn parse_hex(s: &str) -> Result<i32, WireError> {
    i32::from_str_radix(s, 16).map_err(|_| WireError::BadNumber(s.to_string()))
}

fn format_hex(v: i32) -> String {
    if v < 0 {
        format!("-{:x}", v.unsigned_abs())
    } else {
        format!("{v:x}")
    }
}
