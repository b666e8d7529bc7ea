use serde::de::{Unexpected, Visitor};

#[macro_export]
macro_rules! u256_struct {
    ($name:ident) => {
        #[derive(PartialEq, Eq, Clone, Copy, Hash, Default, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        #[allow(dead_code)]
        impl $name {
            pub const fn zero() -> Self {
                Self([0; 32])
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0; 32]
            }

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                bytes.try_into().ok().map(Self)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn random() -> Self {
                Self(rand::random())
            }

            pub fn number(&self) -> primitive_types::U256 {
                primitive_types::U256::from_big_endian(&self.0)
            }

            pub fn encode_hex(&self) -> String {
                hex::encode_upper(self.0)
            }

            pub fn decode_hex(s: impl AsRef<str>) -> anyhow::Result<Self> {
                Ok(Self::from_bytes($crate::u256_struct::decode_32_bytes_hex(s)?))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                let mut bytes = [0; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Self::from_bytes(bytes)
            }
        }

        impl From<u128> for $name {
            fn from(value: u128) -> Self {
                let mut bytes = [0; 32];
                bytes[16..].copy_from_slice(&value.to_be_bytes());
                Self::from_bytes(bytes)
            }
        }

        impl From<primitive_types::U256> for $name {
            fn from(value: primitive_types::U256) -> Self {
                let mut result = Self::zero();
                value.to_big_endian(&mut result.0);
                result
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                $crate::write_hex_bytes(&self.0, f)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                $crate::write_hex_bytes(&self.0, f)
            }
        }

        $crate::serialize_32_byte_string!($name);
    };
}

/// Implements lossless conversions between two 32 byte types
#[macro_export]
macro_rules! u256_struct_conversion {
    ($from:ident, $to:ident) => {
        impl From<$from> for $to {
            fn from(value: $from) -> Self {
                $to::from_bytes(*value.as_bytes())
            }
        }

        impl From<&$from> for $to {
            fn from(value: &$from) -> Self {
                $to::from_bytes(*value.as_bytes())
            }
        }
    };
}

pub fn decode_32_bytes_hex(s: impl AsRef<str>) -> anyhow::Result<[u8; 32]> {
    let s = s.as_ref();
    if s.is_empty() || s.len() > 64 {
        bail!(
            "Invalid U256 string length. Expected <= 64 but was {}",
            s.len()
        );
    }

    let padded = format!("{:0>64}", s);
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(padded, &mut bytes)?;
    Ok(bytes)
}

#[macro_export]
macro_rules! serialize_32_byte_string {
    ($name:ident) => {
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.encode_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = deserializer.deserialize_str($crate::u256_struct::U256Visitor {})?;
                Ok(Self::from_bytes(value))
            }
        }
    };
}

pub struct U256Visitor {}

impl<'de> Visitor<'de> for U256Visitor {
    type Value = [u8; 32];

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a hex string containing 32 bytes")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        decode_32_bytes_hex(v).map_err(|_| {
            serde::de::Error::invalid_value(Unexpected::Str(v), &"a hex string containing 32 bytes")
        })
    }
}
