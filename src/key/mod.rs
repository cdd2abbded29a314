//! Key Module
//!
//! Canonical, order-preserving storage keys.
//!
//! ## Responsibilities
//! - Encode typed values into strings whose ordinal order matches the values' order
//! - Join components with a reserved separator
//! - Build half-open prefix ranges via increment/decrement of the last character
//!
//! ## Wire Format
//! ```text
//! ┌───────────────┬───┬───────────────┬───┬─────────────────────┐
//! │ component 0   │ / │ component 1   │ / │ last component      │
//! │ [0-9A-Za-z]*  │   │ [0-9A-Za-z]*  │   │ any characters      │
//! └───────────────┴───┴───────────────┴───┴─────────────────────┘
//! ```
//!
//! Every backend compares keys by ordinal byte order, so a range
//! `[prefix, StorageKey::increment(prefix))` selects exactly the keys that
//! start with `prefix`.

mod component;

use std::any::Any;

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, SlotError};

pub use component::{FromKeyComponent, KeyComponent};

/// Reserved character joining key components
pub const SEPARATOR: char = '/';

/// Build a storage key from components: `storage_key!("users", 42u32, name)`
#[macro_export]
macro_rules! storage_key {
    ($($part:expr),+ $(,)?) => {
        $crate::key::StorageKey::encode(&[$(&$part as &dyn $crate::key::KeyComponent),+])
    };
}

/// Namespace for the key codec operations
pub struct StorageKey;

impl StorageKey {
    /// Encode a single component as a whole key
    pub fn encode_one<T: KeyComponent + ?Sized>(value: &T) -> Result<String> {
        let mut out = String::new();
        value.encode_component(&mut out)?;
        Ok(out)
    }

    /// Encode components in call order, joined by [`SEPARATOR`]
    ///
    /// Every component but the last must encode to `[0-9A-Za-z]*` so the
    /// separator stays unambiguous.
    pub fn encode(parts: &[&dyn KeyComponent]) -> Result<String> {
        let mut out = String::new();
        for (position, part) in parts.iter().enumerate() {
            let start = out.len();
            part.encode_component(&mut out)?;

            let is_last = position + 1 == parts.len();
            if !is_last {
                Self::check_restricted(position, &out[start..])?;
                out.push(SEPARATOR);
            }
        }
        Ok(out)
    }

    /// Encode runtime-typed components
    ///
    /// Fails with `UnsupportedKeyType` for any value whose type has no key
    /// encoding.
    pub fn encode_dynamic(parts: &[&dyn Any]) -> Result<String> {
        let mut out = String::new();
        for (position, part) in parts.iter().enumerate() {
            let start = out.len();
            Self::as_component(*part)
                .ok_or_else(|| {
                    SlotError::UnsupportedKeyType(format!("component {} has no key encoding", position))
                })?
                .encode_component(&mut out)?;

            if position + 1 != parts.len() {
                Self::check_restricted(position, &out[start..])?;
                out.push(SEPARATOR);
            }
        }
        Ok(out)
    }

    /// Decode a single-component key
    pub fn decode<T: FromKeyComponent>(key: &str) -> Result<T> {
        T::decode_component(key)
    }

    /// Decode a multi-component key positionally: `decode_parts::<(String, u32)>(key)`
    pub fn decode_parts<T: DecodeParts>(key: &str) -> Result<T> {
        T::decode_parts(&Self::split(key, T::ARITY)?)
    }

    /// Split a key into exactly `count` components
    ///
    /// The last component keeps any separators it contains.
    pub fn split(key: &str, count: usize) -> Result<Vec<&str>> {
        let parts: Vec<&str> = key.splitn(count.max(1), SEPARATOR).collect();
        if parts.len() != count {
            return Err(SlotError::KeyDecode(format!(
                "expected {} components in {:?}, found {}",
                count,
                key,
                parts.len()
            )));
        }
        Ok(parts)
    }

    /// Raise the last character's code point by one
    pub fn increment(key: &str) -> Result<String> {
        Self::step_last(key, 1)
    }

    /// Lower the last character's code point by one
    pub fn decrement(key: &str) -> Result<String> {
        Self::step_last(key, -1)
    }

    /// True when `next` is exactly `key` incremented
    pub fn is_increment(key: &str, next: &str) -> bool {
        let mut a = key.chars();
        let mut b = next.chars();
        match (a.next_back(), b.next_back()) {
            (Some(last), Some(next_last)) => {
                a.as_str() == b.as_str() && next_last as u32 == last as u32 + 1
            }
            _ => false,
        }
    }

    /// Half-open range `[prefix, increment(prefix))` covering every key with this prefix
    pub fn prefix_range(prefix: &str) -> Result<(String, String)> {
        Ok((prefix.to_string(), Self::increment(prefix)?))
    }

    fn step_last(key: &str, delta: i64) -> Result<String> {
        let mut chars = key.chars();
        let last = chars.next_back().ok_or(SlotError::EmptyKey)?;

        let stepped = (last as i64 + delta)
            .try_into()
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                SlotError::KeyOverflow(format!("cannot step U+{:04X} by {}", last as u32, delta))
            })?;

        let mut out = String::with_capacity(key.len() + 1);
        out.push_str(chars.as_str());
        out.push(stepped);
        Ok(out)
    }

    fn check_restricted(position: usize, encoded: &str) -> Result<()> {
        if encoded.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(())
        } else {
            Err(SlotError::InvalidKeyComponent(format!(
                "component {} ({:?}) must be alphanumeric",
                position, encoded
            )))
        }
    }

    fn as_component(value: &dyn Any) -> Option<&dyn KeyComponent> {
        macro_rules! try_types {
            ($($t:ty),*) => {
                $(if let Some(v) = value.downcast_ref::<$t>() {
                    return Some(v);
                })*
            };
        }
        try_types!(
            i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, String,
            &'static str, DateTime<Utc>, NaiveDateTime, Uuid
        );
        None
    }
}

/// Tuples of key components decodable by position
pub trait DecodeParts: Sized {
    const ARITY: usize;

    fn decode_parts(parts: &[&str]) -> Result<Self>;
}

macro_rules! decode_parts_tuple {
    ($arity:expr; $($name:ident => $idx:tt),+) => {
        impl<$($name: FromKeyComponent),+> DecodeParts for ($($name,)+) {
            const ARITY: usize = $arity;

            fn decode_parts(parts: &[&str]) -> Result<Self> {
                Ok(($($name::decode_component(parts[$idx])?,)+))
            }
        }
    };
}

decode_parts_tuple!(1; A => 0);
decode_parts_tuple!(2; A => 0, B => 1);
decode_parts_tuple!(3; A => 0, B => 1, C => 2);
decode_parts_tuple!(4; A => 0, B => 1, C => 2, D => 3);
decode_parts_tuple!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
