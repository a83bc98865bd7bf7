#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for PBKDF2 key derivation.

use proptest::prelude::*;
use webpass_crypto_core::kdf::{derive, KdfParams, MIN_ITERATIONS};

const PROP_PARAMS: KdfParams = KdfParams::new(MIN_ITERATIONS);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Two derivations with the same password and salt are identical.
    #[test]
    fn derive_is_deterministic(
        password in ".{0,64}",
        salt in proptest::collection::vec(any::<u8>(), 16..48),
    ) {
        let a = derive(password.as_bytes(), &salt, &PROP_PARAMS).expect("derive should succeed");
        let b = derive(password.as_bytes(), &salt, &PROP_PARAMS).expect("derive should succeed");
        prop_assert_eq!(a.expose(), b.expose());
    }

    /// Distinct passwords never collide under the same salt.
    #[test]
    fn distinct_passwords_distinct_keys(
        a in "[a-z]{1,24}",
        b in "[A-Z]{1,24}",
    ) {
        let salt = b"proptest_salt_16b";
        let ka = derive(a.as_bytes(), salt, &PROP_PARAMS).unwrap();
        let kb = derive(b.as_bytes(), salt, &PROP_PARAMS).unwrap();
        prop_assert_ne!(ka.expose(), kb.expose());
    }
}
