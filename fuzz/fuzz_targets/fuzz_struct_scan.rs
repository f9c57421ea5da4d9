#![no_main]

//! Fuzz structural navigation over the scratch buffer.
//!
//! Two strategies:
//! 1. Arbitrary bytes and lane ranges → findsym / objectsize / tuple must
//!    return a result or an error, never panic.
//! 2. Structured records → every field present must be found, with the
//!    exact encoded bytes, by both the fresh and the resumed lookup.

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use lanes_types::{IonValue, LANES, ValueRef, ion, resolve};
use lanes_vm::ops::{find_symbol, find_symbol_resume, object_size, tuple};
use lanes_vm::{BReg, ScratchBuilder, VReg};

#[derive(Debug, Arbitrary)]
enum FuzzScalar {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl FuzzScalar {
    fn to_ion(&self) -> IonValue {
        match self {
            Self::Null => IonValue::Null,
            Self::Bool(b) => IonValue::Bool(*b),
            Self::Int(i) => IonValue::Int(*i),
            Self::Text(s) => IonValue::String(s.clone()),
            Self::Blob(b) => IonValue::Blob(b.clone()),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Raw scratch bytes.
    raw: Vec<u8>,
    /// Per-lane `(offset, size)` into `raw`, clamped to its length.
    lanes: Vec<(u16, u16)>,
    mask: u16,
    symbol: u32,
    /// One structured record.
    fields: Vec<(u16, FuzzScalar)>,
}

fn raw_lanes(raw: &[u8], lanes: &[(u16, u16)]) -> (BReg, VReg) {
    let mut bodies = BReg::ZERO;
    let mut values = VReg::ZERO;
    let len = raw.len();
    for (lane, &(offset, size)) in lanes.iter().take(LANES).enumerate() {
        let start = usize::from(offset).min(len);
        let size = usize::from(size).min(len - start);
        let range = ValueRef::from_span(start, size).expect("fits in u32");
        bodies.set(lane, range);
        let tag = raw.get(start).copied().unwrap_or(0);
        let header = ion::extent(&raw[start..]).map_or(1, |e| e.header);
        values.set(lane, range, tag, u8::try_from(header).unwrap_or(u8::MAX));
    }
    (bodies, values)
}

fuzz_target!(|input: FuzzInput| {
    // Strategy 1: arbitrary bytes must never panic.
    if input.raw.len() <= 65536 {
        let (bodies, values) = raw_lanes(&input.raw, &input.lanes);
        let found = find_symbol(&input.raw, &bodies, input.symbol, input.mask);
        if let Ok((prior, prior_mask)) = found {
            let _ = find_symbol_resume(
                &input.raw,
                &bodies,
                &prior,
                prior_mask,
                input.symbol.saturating_add(1),
                input.mask,
            );
        }
        let _ = object_size(&input.raw, &values, input.mask);
        let _ = tuple(&input.raw, &values, input.mask);
    }

    // Strategy 2: structured records always find every field.
    if input.fields.len() <= 64 {
        let fields: BTreeMap<u32, IonValue> = input
            .fields
            .iter()
            .map(|(symbol, value)| (u32::from(*symbol), value.to_ion()))
            .collect();
        let mut builder = ScratchBuilder::new();
        builder
            .push_value(&IonValue::structure(fields.clone()))
            .expect("structured record encodes");
        let scratch = builder.finish(&[]).expect("small");
        let bytes = scratch.bytes();
        let mut rows = BReg::ZERO;
        rows.set(0, scratch.rows()[0]);

        let mut prior = VReg::ZERO;
        let mut prior_mask = 0;
        for (&symbol, value) in &fields {
            let (fresh, hit) = find_symbol(bytes, &rows, symbol, 1).expect("well formed");
            assert_eq!(hit, 1, "field ${symbol} not found");
            let encoded = value.encode();
            assert_eq!(
                resolve(bytes, fresh.value_ref(0)).expect("in bounds"),
                encoded.as_slice()
            );

            let (resumed, resumed_hit) =
                find_symbol_resume(bytes, &rows, &prior, prior_mask, symbol, 1)
                    .expect("well formed");
            assert_eq!(resumed_hit, 1, "resumed lookup of ${symbol} missed");
            assert_eq!(resumed.value_ref(0), fresh.value_ref(0));
            prior = resumed;
            prior_mask = resumed_hit;
        }

        let mut outer = VReg::ZERO;
        let encoded = IonValue::structure(fields.clone()).encode();
        let extent = ion::extent(&encoded).expect("encodes");
        outer.set(
            0,
            ValueRef::from_span(0, extent.size).expect("small"),
            encoded[0],
            u8::try_from(extent.header).expect("short header"),
        );
        let (count, counted) = object_size(&encoded, &outer, 1).expect("well formed");
        assert_eq!(counted, 1);
        assert_eq!(count.values[0], i64::try_from(fields.len()).expect("small"));
    }
});
