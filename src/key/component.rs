//! Key components
//!
//! Fixed-width, order-preserving text encodings for each primitive type.
//!
//! | Type                  | Encoding                                          |
//! |-----------------------|---------------------------------------------------|
//! | unsigned integers     | zero-padded decimal, width of `MAX`               |
//! | signed integers       | `value - MIN` as unsigned, then as above          |
//! | `bool`                | `0` / `1`                                         |
//! | `DateTime<Utc>`       | `yyyyMMddHHmmss` + 7 digits of 100 ns ticks       |
//! | `NaiveDateTime`       | same as `DateTime<Utc>`                           |
//! | `Uuid`                | 32 lowercase hex digits                           |
//! | `String` / `&str`     | verbatim                                          |

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use uuid::Uuid;

use crate::error::{Result, SlotError};

/// A value that can be written as one component of a storage key
pub trait KeyComponent {
    /// Append the encoded component to `out`
    fn encode_component(&self, out: &mut String) -> Result<()>;
}

/// A value that can be read back from one component of a storage key
pub trait FromKeyComponent: Sized {
    fn decode_component(text: &str) -> Result<Self>;
}

impl<T: KeyComponent + ?Sized> KeyComponent for &T {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        (**self).encode_component(out)
    }
}

/// Parse exactly `width` ASCII digits
fn parse_digits<T: std::str::FromStr>(text: &str, width: usize, type_name: &str) -> Result<T> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SlotError::KeyDecode(format!(
            "expected {} digits for {}, got {:?}",
            width, type_name, text
        )));
    }
    text.parse()
        .map_err(|_| SlotError::KeyDecode(format!("{:?} is out of range for {}", text, type_name)))
}

macro_rules! unsigned_component {
    ($($t:ty => $width:expr),* $(,)?) => {$(
        impl KeyComponent for $t {
            fn encode_component(&self, out: &mut String) -> Result<()> {
                out.push_str(&format!("{:0width$}", self, width = $width));
                Ok(())
            }
        }

        impl FromKeyComponent for $t {
            fn decode_component(text: &str) -> Result<Self> {
                parse_digits(text, $width, stringify!($t))
            }
        }
    )*};
}

macro_rules! signed_component {
    ($($t:ty as $u:ty),* $(,)?) => {$(
        impl KeyComponent for $t {
            fn encode_component(&self, out: &mut String) -> Result<()> {
                // Shift MIN to zero so decimal order matches numeric order.
                let biased = (*self as $u).wrapping_sub(<$t>::MIN as $u);
                biased.encode_component(out)
            }
        }

        impl FromKeyComponent for $t {
            fn decode_component(text: &str) -> Result<Self> {
                let biased = <$u>::decode_component(text)?;
                Ok(biased.wrapping_add(<$t>::MIN as $u) as $t)
            }
        }
    )*};
}

unsigned_component! {
    u8 => 3,
    u16 => 5,
    u32 => 10,
    u64 => 20,
    u128 => 39,
}

signed_component! {
    i8 as u8,
    i16 as u16,
    i32 as u32,
    i64 as u64,
    i128 as u128,
}

impl KeyComponent for usize {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        (*self as u64).encode_component(out)
    }
}

impl FromKeyComponent for usize {
    fn decode_component(text: &str) -> Result<Self> {
        let value = u64::decode_component(text)?;
        usize::try_from(value)
            .map_err(|_| SlotError::KeyDecode(format!("{} does not fit in usize", value)))
    }
}

impl KeyComponent for isize {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        (*self as i64).encode_component(out)
    }
}

impl FromKeyComponent for isize {
    fn decode_component(text: &str) -> Result<Self> {
        let value = i64::decode_component(text)?;
        isize::try_from(value)
            .map_err(|_| SlotError::KeyDecode(format!("{} does not fit in isize", value)))
    }
}

impl KeyComponent for bool {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        out.push(if *self { '1' } else { '0' });
        Ok(())
    }
}

impl FromKeyComponent for bool {
    fn decode_component(text: &str) -> Result<Self> {
        match text {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(SlotError::KeyDecode(format!("invalid bool {:?}", other))),
        }
    }
}

impl KeyComponent for str {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        out.push_str(self);
        Ok(())
    }
}

impl KeyComponent for String {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        self.as_str().encode_component(out)
    }
}

impl FromKeyComponent for String {
    fn decode_component(text: &str) -> Result<Self> {
        Ok(text.to_string())
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// `yyyyMMddHHmmss` (14) + 100 ns ticks (7)
const TIMESTAMP_WIDTH: usize = 21;

impl KeyComponent for NaiveDateTime {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        let year = self.format("%Y").to_string();
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SlotError::InvalidKeyComponent(format!(
                "timestamp year {} is outside 0000-9999",
                year
            )));
        }
        // nanosecond() exceeds 1e9 only on a leap second
        let nanos = self.nanosecond();
        if nanos >= 1_000_000_000 {
            return Err(SlotError::InvalidKeyComponent(
                "leap-second timestamps cannot be encoded".to_string(),
            ));
        }
        if nanos % 100 != 0 {
            return Err(SlotError::InvalidKeyComponent(format!(
                "timestamp {} is finer than 100 ns",
                self
            )));
        }
        let ticks = nanos / 100;
        out.push_str(&self.format("%Y%m%d%H%M%S").to_string());
        out.push_str(&format!("{:07}", ticks));
        Ok(())
    }
}

impl FromKeyComponent for NaiveDateTime {
    fn decode_component(text: &str) -> Result<Self> {
        if text.len() != TIMESTAMP_WIDTH || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SlotError::KeyDecode(format!("invalid timestamp {:?}", text)));
        }
        let field = |range: std::ops::Range<usize>| -> u32 {
            // all-digit slices of at most 7 chars always parse
            text[range].parse().unwrap_or_default()
        };

        let date = NaiveDate::from_ymd_opt(field(0..4) as i32, field(4..6), field(6..8));
        let time = NaiveTime::from_hms_nano_opt(
            field(8..10),
            field(10..12),
            field(12..14),
            field(14..21) * 100,
        );
        match (date, time) {
            (Some(date), Some(time)) => Ok(NaiveDateTime::new(date, time)),
            _ => Err(SlotError::KeyDecode(format!("invalid timestamp {:?}", text))),
        }
    }
}

impl KeyComponent for DateTime<Utc> {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        self.naive_utc().encode_component(out)
    }
}

impl FromKeyComponent for DateTime<Utc> {
    fn decode_component(text: &str) -> Result<Self> {
        Ok(NaiveDateTime::decode_component(text)?.and_utc())
    }
}

// =============================================================================
// UUIDs
// =============================================================================

impl KeyComponent for Uuid {
    fn encode_component(&self, out: &mut String) -> Result<()> {
        out.push_str(&self.simple().to_string());
        Ok(())
    }
}

impl FromKeyComponent for Uuid {
    fn decode_component(text: &str) -> Result<Self> {
        if text.len() != 32 {
            return Err(SlotError::KeyDecode(format!("invalid uuid {:?}", text)));
        }
        Uuid::try_parse(text).map_err(|e| SlotError::KeyDecode(format!("invalid uuid {:?}: {}", text, e)))
    }
}
