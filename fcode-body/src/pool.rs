//! Constant table boundary.
//!
//! Encoded operands are u16 indices into per-kind pod constant tables. The
//! codec talks to those tables through these traits; pod container I/O is out
//! of scope, so [`PodPools`] provides an owned in-memory implementation for
//! tests and embedding callers that manage serialization themselves.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::refs::{FieldRef, MethodRef, TypeRef};

/// Read access to the constant tables, used by decode.
pub trait ConstantPool {
    fn integer(&self, index: u16) -> Result<i64>;
    fn float(&self, index: u16) -> Result<f64>;
    fn decimal(&self, index: u16) -> Result<&str>;
    fn string(&self, index: u16) -> Result<&str>;
    fn duration(&self, index: u16) -> Result<i64>;
    fn uri(&self, index: u16) -> Result<&str>;
    fn type_ref(&self, index: u16) -> Result<&TypeRef>;
    fn field_ref(&self, index: u16) -> Result<&FieldRef>;
    fn method_ref(&self, index: u16) -> Result<&MethodRef>;
}

/// Write access to the constant tables, used by encode. Interning the same
/// value twice must return the same index.
pub trait ConstantInterner {
    fn intern_integer(&mut self, value: i64) -> u16;
    fn intern_float(&mut self, value: f64) -> u16;
    fn intern_decimal(&mut self, literal: &str) -> u16;
    fn intern_string(&mut self, value: &str) -> u16;
    fn intern_duration(&mut self, ticks: i64) -> u16;
    fn intern_uri(&mut self, value: &str) -> u16;
    fn intern_type(&mut self, value: &TypeRef) -> u16;
    fn intern_field(&mut self, value: &FieldRef) -> u16;
    fn intern_method(&mut self, value: &MethodRef) -> u16;
}

/// Owned constant tables implementing both sides of the boundary.
#[derive(Default)]
pub struct PodPools {
    integers: Table<i64>,
    /// Keyed by bit pattern so NaN interns consistently.
    floats: Table<u64>,
    decimals: Table<String>,
    strings: Table<String>,
    durations: Table<i64>,
    uris: Table<String>,
    types: Table<TypeRef>,
    fields: Table<FieldRef>,
    methods: Table<MethodRef>,
}

impl PodPools {
    pub fn new() -> PodPools {
        PodPools::default()
    }
}

struct Table<T> {
    values: Vec<T>,
    index: HashMap<T, u16>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + std::hash::Hash> Table<T> {
    fn get(&self, table: &'static str, index: u16) -> Result<&T> {
        self.values
            .get(index as usize)
            .ok_or(Error::BadConstantIndex { table, index })
    }

    fn intern(&mut self, value: T) -> u16 {
        if let Some(existing) = self.index.get(&value) {
            return *existing;
        }
        let index = self.values.len() as u16;
        self.values.push(value.clone());
        self.index.insert(value, index);
        index
    }
}

impl ConstantPool for PodPools {
    fn integer(&self, index: u16) -> Result<i64> {
        self.integers.get("integer", index).copied()
    }
    fn float(&self, index: u16) -> Result<f64> {
        self.floats.get("float", index).map(|bits| f64::from_bits(*bits))
    }
    fn decimal(&self, index: u16) -> Result<&str> {
        self.decimals.get("decimal", index).map(String::as_str)
    }
    fn string(&self, index: u16) -> Result<&str> {
        self.strings.get("string", index).map(String::as_str)
    }
    fn duration(&self, index: u16) -> Result<i64> {
        self.durations.get("duration", index).copied()
    }
    fn uri(&self, index: u16) -> Result<&str> {
        self.uris.get("uri", index).map(String::as_str)
    }
    fn type_ref(&self, index: u16) -> Result<&TypeRef> {
        self.types.get("type", index)
    }
    fn field_ref(&self, index: u16) -> Result<&FieldRef> {
        self.fields.get("field", index)
    }
    fn method_ref(&self, index: u16) -> Result<&MethodRef> {
        self.methods.get("method", index)
    }
}

impl ConstantInterner for PodPools {
    fn intern_integer(&mut self, value: i64) -> u16 {
        self.integers.intern(value)
    }
    fn intern_float(&mut self, value: f64) -> u16 {
        self.floats.intern(value.to_bits())
    }
    fn intern_decimal(&mut self, literal: &str) -> u16 {
        self.decimals.intern(literal.to_string())
    }
    fn intern_string(&mut self, value: &str) -> u16 {
        self.strings.intern(value.to_string())
    }
    fn intern_duration(&mut self, ticks: i64) -> u16 {
        self.durations.intern(ticks)
    }
    fn intern_uri(&mut self, value: &str) -> u16 {
        self.uris.intern(value.to_string())
    }
    fn intern_type(&mut self, value: &TypeRef) -> u16 {
        self.types.intern(value.clone())
    }
    fn intern_field(&mut self, value: &FieldRef) -> u16 {
        self.fields.intern(value.clone())
    }
    fn intern_method(&mut self, value: &MethodRef) -> u16 {
        self.methods.intern(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut pools = PodPools::new();
        let a = pools.intern_string("hello");
        let b = pools.intern_string("world");
        assert_ne!(a, b);
        assert_eq!(pools.intern_string("hello"), a);
        assert_eq!(pools.string(a).unwrap(), "hello");
    }

    #[test]
    fn out_of_range_index_errors() {
        let pools = PodPools::new();
        assert!(matches!(
            pools.integer(3),
            Err(Error::BadConstantIndex { table: "integer", index: 3 })
        ));
    }

    #[test]
    fn nan_floats_intern_to_one_slot() {
        let mut pools = PodPools::new();
        let a = pools.intern_float(f64::NAN);
        let b = pools.intern_float(f64::NAN);
        assert_eq!(a, b);
        assert!(pools.float(a).unwrap().is_nan());
    }
}
