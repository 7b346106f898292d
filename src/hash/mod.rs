//! Hash value type: field → value map with a packed form for small
//! instances and a table form above the configured thresholds.

use tracing::debug;

use crate::config::Config;
use crate::dict::Dict;
use crate::error::{Error, Result};
use crate::num::{format_double, parse_float, parse_int};
use crate::packed::{PackedSeq, PackedValue};

/// Field → value map.
///
/// The packed form interleaves fields and values in one packed sequence,
/// in insertion order. Once an insert pushes the field count past
/// `hash_max_packed_entries`, or any inserted field or value exceeds
/// `hash_max_packed_value_bytes`, the hash converts to the table form
/// and never goes back.
pub enum Hash {
    Packed(PackedSeq),
    Table(Dict<Box<[u8]>>),
}

impl Default for Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl Hash {
    pub fn new() -> Self {
        Hash::Packed(PackedSeq::new())
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, Hash::Packed(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Hash::Packed(seq) => seq.len() / 2,
            Hash::Table(dict) => dict.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, field: &[u8]) -> Option<Vec<u8>> {
        match self {
            Hash::Packed(seq) => {
                let head = seq.head()?;
                let fpos = seq.find_from(head, field, 1)?;
                let vpos = seq
                    .next_pos(fpos)
                    .unwrap_or_else(|| panic!("hash packed form has a field with no value"));
                Some(seq.get_bytes(vpos))
            }
            Hash::Table(dict) => dict.get(field).map(|v| v.to_vec()),
        }
    }

    pub fn exists(&self, field: &[u8]) -> bool {
        match self {
            Hash::Packed(seq) => match seq.head() {
                Some(head) => seq.find_from(head, field, 1).is_some(),
                None => false,
            },
            Hash::Table(dict) => dict.contains(field),
        }
    }

    pub fn strlen(&self, field: &[u8]) -> usize {
        self.get(field).map_or(0, |v| v.len())
    }

    /// Set a field, converting encodings as thresholds demand.
    /// Returns true when the field is new.
    pub fn set(&mut self, config: &Config, field: Vec<u8>, value: Vec<u8>) -> bool {
        // Oversized payloads skip the packed form entirely.
        if self.is_packed()
            && (field.len() > config.hash_max_packed_value_bytes
                || value.len() > config.hash_max_packed_value_bytes)
        {
            self.convert_to_table();
        }

        match self {
            Hash::Packed(seq) => {
                let found = seq.head().and_then(|h| seq.find_from(h, &field, 1));
                let created = match found {
                    Some(fpos) => {
                        let vpos = seq
                            .next_pos(fpos)
                            .unwrap_or_else(|| panic!("hash packed form has a field with no value"));
                        seq.delete(vpos);
                        seq.insert_before(vpos, &value);
                        false
                    }
                    None => {
                        seq.push_tail(&field);
                        seq.push_tail(&value);
                        true
                    }
                };
                if self.len() > config.hash_max_packed_entries {
                    self.convert_to_table();
                }
                created
            }
            Hash::Table(dict) => dict.insert(field, value.into_boxed_slice()).is_none(),
        }
    }

    /// Set only when the field is absent. Returns true when it was set.
    pub fn set_if_absent(&mut self, config: &Config, field: Vec<u8>, value: Vec<u8>) -> bool {
        if self.exists(&field) {
            return false;
        }
        self.set(config, field, value);
        true
    }

    /// Delete a field. Returns true when it existed.
    pub fn delete(&mut self, field: &[u8]) -> bool {
        match self {
            Hash::Packed(seq) => {
                let Some(head) = seq.head() else { return false };
                match seq.find_from(head, field, 1) {
                    Some(fpos) => {
                        seq.delete(fpos); // field
                        seq.delete(fpos); // its value, shifted into place
                        true
                    }
                    None => false,
                }
            }
            Hash::Table(dict) => dict.remove(field).is_some(),
        }
    }

    /// Add `delta` to an integer field (missing counts as 0).
    pub fn incr_by(&mut self, config: &Config, field: &[u8], delta: i64) -> Result<i64> {
        let current = match self.get(field) {
            Some(raw) => parse_int(&raw).map_err(|_| Error::HashValueNotAnInteger)?,
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or(Error::Overflow)?;
        self.set(config, field.to_vec(), updated.to_string().into_bytes());
        Ok(updated)
    }

    /// Add `delta` to a float field (missing counts as 0). The stored
    /// result is the deterministic decimal form, which is also what
    /// replication replays via a plain set of this field.
    pub fn incr_by_float(&mut self, config: &Config, field: &[u8], delta: f64) -> Result<Vec<u8>> {
        let current = match self.get(field) {
            Some(raw) => parse_float(&raw).map_err(|_| Error::HashValueNotAFloat)?,
            None => 0.0,
        };
        let updated = current + delta;
        if updated.is_nan() || updated.is_infinite() {
            return Err(Error::NanOrInfinity);
        }
        let formatted = format_double(updated);
        self.set(config, field.to_vec(), formatted.clone());
        Ok(formatted)
    }

    /// Materialise all (field, value) pairs. Packed yields insertion
    /// order; the table form yields arbitrary order.
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self {
            Hash::Packed(seq) => {
                let mut out = Vec::with_capacity(seq.len() / 2);
                let mut it = seq.iter();
                while let (Some(field), Some(value)) = (it.next(), it.next()) {
                    out.push((field.to_bytes(), value.to_bytes()));
                }
                out
            }
            Hash::Table(dict) => {
                dict.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
            }
        }
    }

    /// One-shot packed → table conversion.
    fn convert_to_table(&mut self) {
        let Hash::Packed(seq) = self else {
            panic!("hash: conversion from table form is not a thing")
        };
        let mut dict = Dict::new();
        dict.reserve(seq.len() / 2);
        let mut it = seq.iter();
        while let Some(field) = it.next() {
            let value = match it.next() {
                Some(v) => v,
                None => panic!("hash packed form has a field with no value"),
            };
            let field = match field {
                PackedValue::Bytes(b) => b.to_vec(),
                PackedValue::Int(i) => i.to_string().into_bytes(),
            };
            if dict.insert(field, value.to_bytes().into_boxed_slice()).is_some() {
                panic!("hash packed form contains a duplicate field");
            }
        }
        debug!(fields = dict.len(), "hash converted to table encoding");
        *self = Hash::Table(dict);
    }
}
