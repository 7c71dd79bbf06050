use feature_cache::fingerprint::{fingerprint, Fingerprint};
use proptest::prelude::*;

proptest! {
    /// Property: identical bytes always produce the same fingerprint
    #[test]
    fn identical_bytes_share_a_fingerprint(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let copy = data.clone();
        prop_assert_eq!(fingerprint(&data), fingerprint(&copy));
    }

    /// Property: flipping any single byte changes the fingerprint
    #[test]
    fn single_byte_mutation_changes_fingerprint(
        data in prop::collection::vec(any::<u8>(), 1..4096),
        index in any::<prop::sample::Index>(),
        delta in 1u8..=255,
    ) {
        let mut mutated = data.clone();
        let i = index.index(mutated.len());
        mutated[i] = mutated[i].wrapping_add(delta);
        prop_assert_ne!(fingerprint(&data), fingerprint(&mutated));
    }

    /// Property: appending a byte changes the fingerprint
    #[test]
    fn length_extension_changes_fingerprint(
        data in prop::collection::vec(any::<u8>(), 0..1024),
        extra in any::<u8>(),
    ) {
        let mut longer = data.clone();
        longer.push(extra);
        prop_assert_ne!(fingerprint(&data), fingerprint(&longer));
    }

    /// Property: the hex form parses back to the same fingerprint
    #[test]
    fn hex_form_parses_back(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let fp = fingerprint(&data);
        let hex = fp.to_hex();
        prop_assert_eq!(hex.len(), 64);
        prop_assert_eq!(Fingerprint::from_hex(&hex), Some(fp));
        prop_assert!(fp.cache_key().ends_with(&hex));
    }
}
