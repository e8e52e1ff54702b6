use hex::{FromHex, ToHex};
use num_bigint::BigUint;
use num_traits::Zero;
use once_cell::sync::OnceCell;
use serde::{
    de::{self, Deserialize, Deserializer, Visitor},
    Serialize, Serializer,
};

use std::fmt;
use std::ops::{Add, Deref};
use std::str::FromStr;

/// Energy (the gas-equivalent unit) metered per precompiled invocation.
pub type Nrg = u64;

/// A 32-byte account identifier. Byte 0 is the prefix that classifies the
/// account (ordinary account vs. release-schedule contract), bytes 1..31 are
/// the "body".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Addr([u8; 32]);

/// A non-negative arbitrary-precision value used for balances and transfer
/// amounts. The two consensus encodings live here: the minimal
/// two's-complement form that goes into signed messages, and the fixed-width
/// unsigned form used by input frames.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Scalar(BigUint);

#[derive(Clone, Default)]
pub struct Bytes(Vec<u8>);

// Addr

impl Addr {
    pub const LEN: usize = 32;

    #[inline]
    pub fn zero() -> &'static Self {
        static V: OnceCell<Addr> = OnceCell::new();
        V.get_or_init(|| Addr([0; 32]))
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline(always)]
    pub fn to_fixed_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Panics if the slice is not exactly 32 bytes; callers are expected to
    /// have length-checked their frames already.
    #[inline(always)]
    pub fn from_slice(s: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(s);
        Self(bytes)
    }

    #[inline(always)]
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }

    /// The low 31 bytes, i.e. everything but the prefix.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.0[1..]
    }
}

impl From<[u8; 32]> for Addr {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Addr {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = <[u8; 32]>::from_hex(s).map_err(|_| ())?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", BytesRef(&self.0))
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::LowerHex for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&BytesRef(&self.0), f)
    }
}

impl Serialize for Addr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BytesRef::serialize(&BytesRef(self.as_bytes()), serializer)
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let bytes = deserializer.deserialize_identifier(BytesVisitor)?.0;
        if bytes.len() != Self::LEN {
            return Err(D::Error::invalid_length(
                bytes.len(),
                &"length of 32 bytes",
            ))
        }
        Ok(Addr::from_slice(&bytes))
    }
}

// Scalar

impl Scalar {
    #[inline]
    pub fn zero() -> &'static Self {
        static V: OnceCell<Scalar> = OnceCell::new();
        V.get_or_init(|| Scalar(BigUint::zero()))
    }

    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Reads a big-endian byte string as an unsigned value. This is how the
    /// fixed-width input fields (amounts, raw percent bytes) are parsed.
    #[inline]
    pub fn from_unsigned_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// The minimal two's-complement big-endian encoding of this value: a
    /// single zero byte for zero, otherwise the magnitude bytes with one
    /// leading zero added whenever the top bit is set. Signed messages and
    /// the storage row canonicalisation both build on this form.
    pub fn signed_be_bytes(&self) -> Vec<u8> {
        if self.0.is_zero() {
            return vec![0]
        }
        let mut bytes = self.0.to_bytes_be();
        if bytes[0] & 0x80 != 0 {
            bytes.insert(0, 0);
        }
        bytes
    }

    /// Right-aligns the unsigned magnitude in a zero-filled field of `width`
    /// bytes, or `None` if the value does not fit.
    pub fn to_unsigned_padded(&self, width: usize) -> Option<Vec<u8>> {
        let raw = self.0.to_bytes_be();
        let len = if self.0.is_zero() { 0 } else { raw.len() };
        if len > width {
            return None
        }
        let mut out = vec![0u8; width];
        out[width - len..].copy_from_slice(&raw[raw.len() - len..]);
        Some(out)
    }

    #[inline]
    pub fn checked_sub(&self, other: &Scalar) -> Option<Scalar> {
        if self.0 < other.0 {
            return None
        }
        Some(Scalar(&self.0 - &other.0))
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for Scalar {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl From<Scalar> for BigUint {
    fn from(v: Scalar) -> Self {
        v.0
    }
}

impl<'a, 'b> Add<&'b Scalar> for &'a Scalar {
    type Output = Scalar;
    fn add(self, other: &'b Scalar) -> Scalar {
        Scalar(&self.0 + &other.0)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// Bytes

impl Bytes {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(s: &[u8]) -> Self {
        Self(s.into())
    }
}

impl Deref for Bytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        <BytesRef as fmt::LowerHex>::fmt(&BytesRef(self), f)
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        <BytesRef as fmt::LowerHex>::fmt(&BytesRef(self), f)
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BytesRef::serialize(&BytesRef(self), serializer)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_identifier(BytesVisitor)
    }
}

pub struct BytesRef<'a>(pub &'a [u8]);

impl<'a> From<&'a [u8]> for BytesRef<'a> {
    fn from(s: &'a [u8]) -> Self {
        Self(s)
    }
}

impl<'a> fmt::LowerHex for BytesRef<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.encode_hex::<String>())
    }
}

impl<'a> Serialize for BytesRef<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", &self))
    }
}

pub struct BytesVisitor;
impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Bytes;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .write_str("starts with `0x` and has even number of hex digits")
    }

    fn visit_str<E>(self, value: &str) -> Result<Bytes, E>
    where
        E: de::Error,
    {
        if value.len() < 2 {
            return Err(de::Error::invalid_length(value.len(), &self))
        }
        let bytes = value.as_bytes();
        if bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
            match Vec::from_hex(&value[2..]) {
                Ok(v) => Ok(v.into()),
                Err(_) => Err(de::Error::invalid_value(
                    de::Unexpected::Str(value),
                    &self,
                )),
            }
        } else {
            Err(de::Error::invalid_value(de::Unexpected::Str(value), &self))
        }
    }
}
