//! `webpass-crypto-core` — Cryptographic engine for WebPass.
//!
//! Everything that touches key material lives here: master-password key
//! derivation, envelope wrapping of the application key, per-site secret
//! encryption, the password verifier and signed session tokens.
//!
//! No filesystem access, no logging. The vault crate owns persistence.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod envelope;
pub mod secret;

pub mod verifier;

pub mod session;

pub use envelope::{unwrap, wrap};
pub use error::CryptoError;
pub use kdf::{
    derive, fingerprint, generate_salt, KdfParams, DEFAULT_ITERATIONS, MIN_ITERATIONS, SALT_LEN,
};
pub use memory::{SecretKey, SecretText, KEY_LEN};
pub use secret::{decrypt_secret, encrypt_secret};
pub use session::{unix_now, SessionSigner, Token};
pub use symmetric::Ciphertext;
pub use verifier::{hash_password, validate};
