//! Property-based tests for nebula-core
//!
//! Uses proptest to verify invariants across randomized inputs

use nebula_core::random::SeededRandom;
use nebula_core::{
    derive_keypair, format_sol, format_ui_amount, parse_sol, parse_ui_amount, verify,
    MnemonicCodec, MnemonicStrength, Pubkey,
};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate a seed for the deterministic entropy source
fn rng_seed_strategy() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// Generate account indices (non-hardened range)
fn account_index_strategy() -> impl Strategy<Value = u32> {
    0u32..1_000
}

/// Generate message payloads (0-256 bytes)
fn message_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

// ============================================================================
// Mnemonic and Key Derivation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: generated phrases always validate
    #[test]
    fn prop_generated_mnemonic_validates(seed in rng_seed_strategy()) {
        let codec = MnemonicCodec::new(Arc::new(SeededRandom::new(seed)));
        let m12 = codec.generate(MnemonicStrength::Words12).unwrap();
        let m24 = codec.generate(MnemonicStrength::Words24).unwrap();
        prop_assert!(MnemonicCodec::validate(m12.phrase()));
        prop_assert!(MnemonicCodec::validate(m24.phrase()));
        prop_assert_eq!(m12.word_count(), 12);
        prop_assert_eq!(m24.word_count(), 24);
    }

    /// Property: same phrase + index = same address
    #[test]
    fn prop_deterministic_key_derivation(
        seed in rng_seed_strategy(),
        index in account_index_strategy()
    ) {
        let codec = MnemonicCodec::new(Arc::new(SeededRandom::new(seed)));
        let mnemonic = codec.generate(MnemonicStrength::Words12).unwrap();
        let reparsed = MnemonicCodec::parse(mnemonic.phrase()).unwrap();

        let a = derive_keypair(&mnemonic, index).unwrap();
        let b = derive_keypair(&reparsed, index).unwrap();
        prop_assert_eq!(a.public_key(), b.public_key());
    }

    /// Property: different account indices give different addresses
    #[test]
    fn prop_accounts_are_distinct(
        seed in rng_seed_strategy(),
        i in account_index_strategy(),
        j in account_index_strategy()
    ) {
        prop_assume!(i != j);
        let codec = MnemonicCodec::new(Arc::new(SeededRandom::new(seed)));
        let mnemonic = codec.generate(MnemonicStrength::Words12).unwrap();
        let a = derive_keypair(&mnemonic, i).unwrap();
        let b = derive_keypair(&mnemonic, j).unwrap();
        prop_assert_ne!(a.public_key(), b.public_key());
    }

    /// Property: signatures verify under the signer's key only
    #[test]
    fn prop_signatures_verify(seed in rng_seed_strategy(), message in message_strategy()) {
        let codec = MnemonicCodec::new(Arc::new(SeededRandom::new(seed)));
        let mnemonic = codec.generate(MnemonicStrength::Words12).unwrap();
        let keypair = derive_keypair(&mnemonic, 0).unwrap();
        let other = derive_keypair(&mnemonic, 1).unwrap();

        let sig = keypair.sign(&message);
        prop_assert!(verify(&keypair.public_key(), &message, &sig));
        prop_assert!(!verify(&other.public_key(), &message, &sig));
    }
}

// ============================================================================
// Address and Amount Properties
// ============================================================================

proptest! {
    /// Property: base58 text of any 32 bytes parses back to the same address
    #[test]
    fn prop_address_text_round_trip(bytes in any::<[u8; 32]>()) {
        let key = Pubkey::new_from_array(bytes);
        let parsed: Pubkey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    /// Property: formatted lamports parse back exactly
    #[test]
    fn prop_sol_format_parse(lamports in any::<u64>()) {
        prop_assert_eq!(parse_sol(&format_sol(lamports)).unwrap(), lamports);
    }

    /// Property: token amounts survive formatting at their own precision
    #[test]
    fn prop_token_format_parse(raw in 0u64..=u64::MAX / 10, decimals in 0u8..=9) {
        prop_assert_eq!(parse_ui_amount(&format_ui_amount(raw, decimals), decimals).unwrap(), raw);
    }
}
