//! Fixed-width sort records.

use crate::error::SortError;
use std::cmp::Ordering;
use std::fmt;

/// Length of a record key in bytes.
pub const KEY_LEN: usize = 10;
/// Length of a record value in bytes.
pub const VALUE_LEN: usize = 90;
/// Length of a serialized record (key followed by value).
pub const RECORD_LEN: usize = KEY_LEN + VALUE_LEN;

pub type Key = [u8; KEY_LEN];
pub type Value = [u8; VALUE_LEN];

/// An immutable key/value pair of fixed length.
///
/// Records are ordered only through [`Record::cmp_key`]; two records with the
/// same key but different values are distinct and both survive a sort.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    key: Key,
    value: Value,
}

impl Record {
    pub fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }

    /// Split a serialized 100-byte span into key and value.
    pub fn from_array(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut key = [0u8; KEY_LEN];
        let mut value = [0u8; VALUE_LEN];
        key.copy_from_slice(&bytes[..KEY_LEN]);
        value.copy_from_slice(&bytes[KEY_LEN..]);
        Self { key, value }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Serialize as key immediately followed by value.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        self.write_into(&mut out);
        out
    }

    /// Write key and value into the first `RECORD_LEN` bytes of `out`.
    ///
    /// Panics if `out` is shorter than `RECORD_LEN`.
    pub fn write_into(&self, out: &mut [u8]) {
        out[..KEY_LEN].copy_from_slice(&self.key);
        out[KEY_LEN..RECORD_LEN].copy_from_slice(&self.value);
    }

    /// Unsigned lexicographic comparison of the keys only.
    pub fn cmp_key(&self, other: &Record) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl TryFrom<&[u8]> for Record {
    type Error = SortError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: &[u8; RECORD_LEN] = bytes.try_into().map_err(|_| {
            SortError::io_error(format!(
                "record must be exactly {} bytes, got {}",
                RECORD_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::from_array(array))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key: String = self.key.iter().map(|b| format!("{:02x}", b)).collect();
        f.debug_struct("Record")
            .field("key", &key)
            .field("value_len", &VALUE_LEN)
            .finish()
    }
}
