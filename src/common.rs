use hex::FromHex;
use once_cell::sync::OnceCell;
pub use primitive_types::U256;
use primitive_types::{H160, H256};
use serde::{
    de::{self, Deserialize, Deserializer, Visitor},
    Serialize, Serializer,
};
use sha3::Digest;

use std::fmt;
use std::str::FromStr;

/// Position of a state change: a block number or any other monotonically increasing counter.
pub type Ordinal = u64;

/// Token amount (balances, explicit delegations, realized vote power).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug)]
pub struct Wei(U256);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Addr(H160);

#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct Hash(H256);

// Wei

impl Wei {
    #[inline(always)]
    pub fn checked_add(&self, other: &Wei) -> Option<Wei> {
        Some(Wei(self.0.checked_add(other.0)?))
    }

    #[inline(always)]
    pub fn checked_sub(&self, other: &Wei) -> Option<Wei> {
        Some(Wei(self.0.checked_sub(other.0)?))
    }

    #[inline]
    pub fn zero() -> &'static Self {
        static V: OnceCell<Wei> = OnceCell::new();
        V.get_or_init(|| U256::zero().into())
    }

    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline(always)]
    pub fn as_u256(&self) -> &U256 {
        &self.0
    }
}

impl From<U256> for Wei {
    fn from(u: U256) -> Self {
        Self(u)
    }
}

impl From<u64> for Wei {
    fn from(u: u64) -> Self {
        Self(u.into())
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::LowerHex for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for Wei {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", &self))
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(deserializer.deserialize_str(U256Visitor)?.into())
    }
}

// Addr

impl Addr {
    /// The zero identifier. Nobody may delegate to it.
    #[inline]
    pub fn zero() -> &'static Self {
        static V: OnceCell<Addr> = OnceCell::new();
        V.get_or_init(|| U256::zero().into())
    }

    #[inline(always)]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[inline(always)]
    pub fn from_slice(s: &[u8]) -> Self {
        Self(H160::from_slice(s))
    }
}

impl From<U256> for Addr {
    fn from(u: U256) -> Self {
        let mut bytes: [u8; 32] = Default::default();
        u.to_big_endian(&mut bytes);
        Self::from_slice(&bytes[12..])
    }
}

impl From<u64> for Addr {
    fn from(u: u64) -> Self {
        U256::from(u).into()
    }
}

impl FromStr for Addr {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        Ok(Self(H160::from_str(s).map_err(|_| ())?))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Addr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.as_bytes())))
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let bytes = deserializer.deserialize_str(BytesVisitor)?;
        if bytes.len() != 20 {
            return Err(D::Error::invalid_length(
                bytes.len(),
                &"length of 20 bytes",
            ))
        }
        Ok(Addr::from_slice(&bytes))
    }
}

// Hash

impl Hash {
    #[inline(always)]
    pub fn hash(slice: &[u8]) -> Self {
        Self::from_slice(sha3::Keccak256::digest(slice).as_slice())
    }

    #[inline(always)]
    pub fn from_slice(s: &[u8]) -> Self {
        Self(H256::from_slice(s))
    }
}

pub struct BytesVisitor;

impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .write_str("starts with `0x` and has even number of hex digits")
    }

    fn visit_str<E>(self, value: &str) -> Result<Vec<u8>, E>
    where
        E: de::Error,
    {
        if value.len() < 2 {
            return Err(de::Error::invalid_length(value.len(), &self))
        }
        let bytes = value.as_bytes();
        if bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
            Vec::from_hex(&value[2..]).map_err(|_| {
                de::Error::invalid_value(de::Unexpected::Str(value), &self)
            })
        } else {
            Err(de::Error::invalid_value(de::Unexpected::Str(value), &self))
        }
    }
}

pub struct U256Visitor;

impl<'de> Visitor<'de> for U256Visitor {
    type Value = U256;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a hex string that starts with `0x`")
    }

    fn visit_str<E>(self, value: &str) -> Result<U256, E>
    where
        E: de::Error,
    {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| {
                de::Error::invalid_value(de::Unexpected::Str(value), &self)
            })?;
        U256::from_str_radix(digits, 16).map_err(|_| {
            de::Error::invalid_value(de::Unexpected::Str(value), &self)
        })
    }
}

// NOTE: adapted from https://docs.rs/impl-rlp/latest/src/impl_rlp/lib.rs.html
macro_rules! impl_wrapped_uint_rlp {
    ($name: ident, $wrapper_name: ident, $size: expr) => {
        impl rlp::Encodable for $wrapper_name {
            fn rlp_append(&self, s: &mut rlp::RlpStream) {
                let leading_empty_bytes = $size * 8 - (self.0.bits() + 7) / 8;
                let mut buffer = [0u8; $size * 8];
                self.0.to_big_endian(&mut buffer);
                s.encoder().encode_value(&buffer[leading_empty_bytes..]);
            }
        }

        impl rlp::Decodable for $wrapper_name {
            fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
                rlp.decoder().decode_value(|bytes| {
                    if !bytes.is_empty() && bytes[0] == 0 {
                        Err(rlp::DecoderError::RlpInvalidIndirection)
                    } else if bytes.len() <= $size * 8 {
                        Ok($wrapper_name($name::from(bytes)))
                    } else {
                        Err(rlp::DecoderError::RlpIsTooBig)
                    }
                })
            }
        }
    };
}

// NOTE: adapted from https://docs.rs/impl-rlp/latest/src/impl_rlp/lib.rs.html
macro_rules! impl_wrapped_fixed_hash_rlp {
    ($name: ident, $wrapper_name: ident, $size: expr) => {
        impl rlp::Encodable for $wrapper_name {
            fn rlp_append(&self, s: &mut rlp::RlpStream) {
                s.encoder().encode_value(self.0.as_ref());
            }
        }

        impl rlp::Decodable for $wrapper_name {
            fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
                rlp.decoder().decode_value(|bytes| {
                    match bytes.len().cmp(&$size) {
                        core::cmp::Ordering::Less => {
                            Err(rlp::DecoderError::RlpIsTooShort)
                        }
                        core::cmp::Ordering::Greater => {
                            Err(rlp::DecoderError::RlpIsTooBig)
                        }
                        core::cmp::Ordering::Equal => {
                            let mut t = [0u8; $size];
                            t.copy_from_slice(bytes);
                            Ok($wrapper_name($name(t)))
                        }
                    }
                })
            }
        }
    };
}

impl_wrapped_uint_rlp!(U256, Wei, 4);
impl_wrapped_fixed_hash_rlp!(H160, Addr, 20);

#[test]
fn test_addr_from_u64() {
    let a: Addr = 1u64.into();
    assert_eq!(
        a,
        Addr::from_str("0x0000000000000000000000000000000000000001").unwrap()
    );
    assert!(Addr::zero().is_zero());
    assert!(!a.is_zero());
}

#[test]
fn test_wei_checked() {
    let a: Wei = 10u64.into();
    let b: Wei = 3u64.into();
    assert_eq!(a.checked_sub(&b), Some(7u64.into()));
    assert_eq!(b.checked_sub(&a), None);
    assert_eq!(Wei::from(U256::MAX).checked_add(&b), None);
}

#[test]
fn test_wei_rlp() {
    let w: Wei = 1_000_000u64.into();
    let encoded = rlp::encode(&w);
    let decoded: Wei = rlp::decode(&encoded).unwrap();
    assert_eq!(w, decoded);
    let zero = rlp::encode(Wei::zero());
    assert_eq!(rlp::decode::<Wei>(&zero).unwrap(), Wei::zero().clone());
}

#[test]
fn test_keccak_of_empty_input() {
    let expected = Vec::from_hex(
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
    )
    .unwrap();
    assert_eq!(Hash::hash(&[]), Hash::from_slice(&expected));
}
