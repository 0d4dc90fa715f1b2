use std::str::FromStr;

use bitcoin::bip32::DerivationPath;
use proptest::prelude::*;
use ssm::path::{self, HARDENED_OFFSET};
use ssm::signer::instructions;
use ssm::MasterBlindingKey;

fn segment() -> impl Strategy<Value = (u32, Option<char>)> {
    (
        0..HARDENED_OFFSET,
        prop_oneof![Just(None), Just(Some('h')), Just(Some('H')), Just(Some('\''))],
    )
}

proptest! {
    #[test]
    fn parse_agrees_with_bip32_notation(segments in prop::collection::vec(segment(), 1..8)) {
        let ours: Vec<String> = segments
            .iter()
            .map(|(index, mark)| match mark {
                Some(mark) => format!("{index}{mark}"),
                None => index.to_string(),
            })
            .collect();
        let canonical: Vec<String> = segments
            .iter()
            .map(|(index, mark)| match mark {
                Some(_) => format!("{index}'"),
                None => index.to_string(),
            })
            .collect();

        let parsed = path::parse(&ours.join("/")).unwrap();
        let reference = DerivationPath::from_str(&format!("m/{}", canonical.join("/"))).unwrap();
        prop_assert_eq!(&parsed, &reference);
        prop_assert_eq!(path::parse(&format!("m/{}", ours.join("/"))).unwrap(), reference);
    }

    #[test]
    fn harden_is_injective_on_lower_half(index in 0..HARDENED_OFFSET) {
        let hardened = path::harden(index).unwrap();
        prop_assert!(hardened >= HARDENED_OFFSET);
        prop_assert_eq!(hardened - HARDENED_OFFSET, index);
        prop_assert_eq!(path::harden(hardened), None);
    }

    #[test]
    fn unsuffixed_index_is_raw(index in any::<u32>()) {
        let parsed = path::parse(&index.to_string()).unwrap();
        let raw: Vec<u32> = parsed.as_ref().iter().map(|c| u32::from(*c)).collect();
        prop_assert_eq!(raw, vec![index]);
    }

    #[test]
    fn blinding_keys_are_deterministic(
        seed in prop::collection::vec(any::<u8>(), 16..64),
        script in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let a = MasterBlindingKey::from_seed(&seed).unwrap();
        let b = MasterBlindingKey::from_seed(&seed).unwrap();
        prop_assert_eq!(a.as_bytes(), b.as_bytes());
        prop_assert_eq!(
            a.blinding_private_key(&script).unwrap(),
            b.blinding_private_key(&script).unwrap()
        );

        let mut other = script.clone();
        other[0] ^= 1;
        prop_assert_ne!(
            a.blinding_private_key(&script).unwrap(),
            a.blinding_private_key(&other).unwrap()
        );
    }

    #[test]
    fn instructions_keep_input_order(count in 1usize..16) {
        let fingerprints: Vec<String> = (0..count).map(|i| format!("{i:08x}")).collect();
        let paths: Vec<String> = (0..count).map(|i| format!("0h/{i}")).collect();
        let values: Vec<String> = (0..count).map(|i| format!("0.{i:08}")).collect();
        let fingerprints = fingerprints.join(" ");
        let paths = paths.join("\t");
        let values = values.join("  ");

        let list = instructions(count, &fingerprints, &paths, &values).unwrap();
        prop_assert_eq!(list.len(), count);
        for (i, instruction) in list.iter().enumerate() {
            prop_assert_eq!(instruction.fingerprint, format!("{i:08x}"));
            prop_assert_eq!(instruction.path, format!("0h/{i}"));
        }

        prop_assert!(instructions(count + 1, &fingerprints, &paths, &values).is_err());
    }
}
