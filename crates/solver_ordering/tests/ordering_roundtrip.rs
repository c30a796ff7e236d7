//! Round-trip properties of application orderings.

use proptest::prelude::*;
use solver_ordering::{ApplicationOrdering, IndexSet, OrderingError};

/// A permutation of `0..n` together with a buffer of native indices and
/// negative sentinels.
fn ordering_and_buffer() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    (1usize..40).prop_flat_map(|n| {
        let permutation = Just((0..n as i64).collect::<Vec<_>>()).prop_shuffle();
        let buffer = prop::collection::vec(-3i64..n as i64, 0..64);
        (permutation, buffer)
    })
}

proptest! {
    #[test]
    fn prop_roundtrip_restores_buffer((application, buffer) in ordering_and_buffer()) {
        let ao = ApplicationOrdering::basic(&application, None).unwrap();
        let mut indices = buffer.clone();

        ao.native_to_application(&mut indices).unwrap();
        for (mapped, original) in indices.iter().zip(&buffer) {
            if *original < 0 {
                prop_assert_eq!(mapped.to_ne_bytes(), original.to_ne_bytes());
            } else {
                prop_assert_eq!(*mapped, application[*original as usize]);
            }
        }

        ao.application_to_native(&mut indices).unwrap();
        prop_assert_eq!(indices, buffer);
    }

    #[test]
    fn prop_index_set_matches_buffer((application, buffer) in ordering_and_buffer()) {
        let native: Vec<i64> = application.iter().rev().copied().collect();
        let ao = ApplicationOrdering::basic(&application, Some(&native)).unwrap();

        let mut raw = buffer.clone();
        ao.application_to_native(&mut raw).unwrap();
        let mut is = IndexSet::general(buffer);
        ao.application_to_native_is(&mut is).unwrap();
        prop_assert_eq!(is.as_general(), Some(raw.as_slice()));
    }
}

#[test]
fn test_stride_covering_whole_range() {
    let ao = ApplicationOrdering::basic(&[4, 3, 2, 1, 0], None).unwrap();
    let mut is = IndexSet::stride(0, 1, 5);
    ao.native_to_application_is(&mut is).unwrap();
    assert_eq!(is.indices(), vec![4, 3, 2, 1, 0]);
}

#[test]
fn test_sentinels_only_buffer() {
    let ao = ApplicationOrdering::basic(&[0], None).unwrap();
    let mut indices = [-1, i64::MIN, -7];
    ao.application_to_native(&mut indices).unwrap();
    assert_eq!(indices, [-1, i64::MIN, -7]);
}

#[test]
fn test_block_sets_rejected_in_both_directions() {
    let ao = ApplicationOrdering::basic(&[1, 0, 3, 2], None).unwrap();
    for translate in [
        ApplicationOrdering::native_to_application_is,
        ApplicationOrdering::application_to_native_is,
    ] {
        let mut is = IndexSet::block(2, vec![1]);
        match translate(&ao, &mut is) {
            Err(OrderingError::BlockIndexSet) => {}
            other => panic!("Expected BlockIndexSet, got {:?}", other),
        }
    }
}
