// lib/src/storage_engine/storage_utils.rs

use bincode::{
    config::{self, BigEndian, Configuration, Fixint},
    serde::{decode_from_slice, encode_to_vec},
};
use serde::{de::DeserializeOwned, Serialize};

use models::medical::{normalize_email, User};
use models::PortalResult;

/// Standard bincode configuration for stored records.
pub fn bincode_config() -> Configuration<BigEndian, Fixint> {
    config::standard().with_big_endian().with_fixed_int_encoding()
}

pub fn encode_record<T: Serialize>(value: &T) -> PortalResult<Vec<u8>> {
    Ok(encode_to_vec(value, bincode_config())?)
}

pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> PortalResult<T> {
    let (value, _): (T, usize) = decode_from_slice(bytes, bincode_config())?;
    Ok(value)
}

/// Unique-key index entry for a user's email.
pub fn email_key(email: &str) -> Vec<u8> {
    format!("email:{}", normalize_email(email)).into_bytes()
}

/// Unique-key index entry for a user's username.
pub fn username_key(username: &str) -> Vec<u8> {
    format!("username:{}", username.trim().to_lowercase()).into_bytes()
}

pub fn user_index_keys(user: &User) -> [Vec<u8>; 2] {
    [email_key(&user.email), username_key(&user.username)]
}
