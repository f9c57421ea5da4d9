//! Property-based tests for the opcode library.
//!
//! Each property either checks an algebraic law over masks (partition,
//! disjointness, composition) or compares an opcode against a naive
//! reference computed from the owned [`IonValue`] the scratch bytes were
//! encoded from.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lanes_types::{
        IonValue, LANES, LaneMask, TYPE_BITS, ValueRef, ion, resolve,
    };
    use proptest::prelude::*;

    use crate::ops::{
        find_symbol, find_symbol_resume, is_false, is_not_null, is_null, is_true, object_size,
        tuple, type_bits,
    };
    use crate::registers::{BReg, VReg};

    // ── Helpers ────────────────────────────────────────────────────────────

    /// Encode `values` back to back and reference one per lane.
    fn load(values: &[IonValue]) -> (Vec<u8>, VReg) {
        let mut buf = Vec::new();
        let mut reg = VReg::ZERO;
        for (lane, value) in values.iter().enumerate() {
            let offset = buf.len();
            value.encode_into(&mut buf);
            let extent = ion::extent(&buf[offset..]).expect("fixture encodes");
            #[allow(clippy::cast_possible_truncation)]
            reg.set(
                lane,
                ValueRef::new(offset as u32, extent.size as u32),
                buf[offset],
                extent.header as u8,
            );
        }
        (buf, reg)
    }

    fn lanes_mask(n: usize) -> LaneMask {
        lanes_types::limits::mask_for_rows(n).expect("n <= LANES")
    }

    fn struct_bodies(structs: &[BTreeMap<u32, IonValue>]) -> (Vec<u8>, BReg, LaneMask) {
        let values: Vec<IonValue> = structs
            .iter()
            .map(|fields| IonValue::structure(fields.clone()))
            .collect();
        let (buf, reg) = load(&values);
        let mask = lanes_mask(values.len());
        let (bodies, kept) = tuple(&buf, &reg, mask).expect("structs resolve");
        assert_eq!(kept, mask);
        (buf, bodies, mask)
    }

    // ── Proptest Strategies ───────────────────────────────────────────────

    fn vreg_with_tags() -> impl Strategy<Value = VReg> {
        prop::array::uniform16(any::<u8>()).prop_map(|tags| VReg {
            tags,
            ..VReg::ZERO
        })
    }

    fn scalar() -> impl Strategy<Value = IonValue> {
        prop_oneof![
            Just(IonValue::Null),
            any::<bool>().prop_map(IonValue::Bool),
            any::<i64>().prop_map(IonValue::Int),
            "[a-z]{0,20}".prop_map(IonValue::String),
            prop::collection::vec(any::<u8>(), 0..24).prop_map(IonValue::Blob),
        ]
    }

    /// Structs with strictly ascending symbols (keys of a map).
    fn record() -> impl Strategy<Value = BTreeMap<u32, IonValue>> {
        prop::collection::btree_map(0_u32..300, scalar(), 0..12)
    }

    fn records() -> impl Strategy<Value = Vec<BTreeMap<u32, IonValue>>> {
        prop::collection::vec(record(), 1..=LANES)
    }

    // ── Predicate laws ────────────────────────────────────────────────────

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_true_and_false_disjoint(reg in vreg_with_tags(), mask in any::<u16>()) {
            prop_assert_eq!(is_true(&reg, mask) & is_false(&reg, mask), 0);
        }

        #[test]
        fn prop_null_partitions_mask(reg in vreg_with_tags(), mask in any::<u16>()) {
            let nulls = is_null(&reg, mask);
            let others = is_not_null(&reg, mask);
            prop_assert_eq!(nulls & others, 0);
            prop_assert_eq!(nulls | others, mask);
        }

        #[test]
        fn prop_type_bits_matches_table(reg in vreg_with_tags(), mask in any::<u16>()) {
            let bits = type_bits(&reg, mask);
            for lane in 0..LANES {
                let expected = if mask & (1 << lane) != 0 {
                    i64::from(TYPE_BITS[usize::from(reg.tags[lane] >> 4)].bits())
                } else {
                    0
                };
                prop_assert_eq!(bits.values[lane], expected);
            }
        }
    }

    // ── Structural navigation ─────────────────────────────────────────────

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_object_size_counts_list_items(
            lens in prop::collection::vec(0_usize..40, 1..=LANES),
        ) {
            let lists: Vec<IonValue> = lens
                .iter()
                .map(|&n| IonValue::list((0..n).map(|i| IonValue::Int(i as i64 - 20))))
                .collect();
            let (buf, reg) = load(&lists);
            let mask = lanes_mask(lists.len());
            let (sizes, kept) = object_size(&buf, &reg, mask).expect("well formed");
            prop_assert_eq!(kept, mask);
            for (lane, &n) in lens.iter().enumerate() {
                prop_assert_eq!(sizes.values[lane], n as i64);
            }
        }

        #[test]
        fn prop_find_symbol_matches_naive(structs in records(), symbol in 0_u32..300) {
            let (buf, bodies, mask) = struct_bodies(&structs);
            let (out, found) = find_symbol(&buf, &bodies, symbol, mask).expect("well formed");
            for (lane, fields) in structs.iter().enumerate() {
                match fields.get(&symbol) {
                    Some(value) => {
                        prop_assert!(found & (1 << lane) != 0);
                        let bytes = resolve(&buf, out.value_ref(lane)).expect("in bounds");
                        let encoded = value.encode();
                        prop_assert_eq!(bytes, encoded.as_slice());
                    }
                    None => {
                        prop_assert!(found & (1 << lane) == 0);
                        prop_assert_eq!(out.value_ref(lane), ValueRef::EMPTY);
                    }
                }
            }
        }

        #[test]
        fn prop_resume_composes_with_fresh(
            structs in records(),
            a in 0_u32..300,
            gap in 1_u32..100,
        ) {
            let b = a + gap;
            let (buf, bodies, mask) = struct_bodies(&structs);
            let (first, first_found) = find_symbol(&buf, &bodies, a, mask).expect("fresh a");
            let (resumed, resumed_found) =
                find_symbol_resume(&buf, &bodies, &first, first_found, b, mask)
                    .expect("resume b");
            let (fresh, fresh_found) = find_symbol(&buf, &bodies, b, mask).expect("fresh b");
            prop_assert_eq!(resumed_found, fresh_found);
            for lane in 0..structs.len() {
                prop_assert_eq!(resumed.value_ref(lane), fresh.value_ref(lane));
                prop_assert_eq!(resumed.tags[lane], fresh.tags[lane]);
            }
        }

        #[test]
        fn prop_masked_out_lanes_never_read(
            structs in records(),
            poison_offsets in prop::array::uniform16(any::<u32>()),
            poison_sizes in prop::array::uniform16(any::<u32>()),
            symbol in 0_u32..300,
        ) {
            let (buf, clean, mask) = struct_bodies(&structs);
            let mut poisoned = clean;
            for lane in structs.len()..LANES {
                poisoned.offsets[lane] = poison_offsets[lane];
                poisoned.sizes[lane] = poison_sizes[lane];
            }
            let expected = find_symbol(&buf, &clean, symbol, mask).expect("clean");
            let actual = find_symbol(&buf, &poisoned, symbol, mask).expect("poison ignored");
            prop_assert_eq!(actual, expected);
        }
    }
}
