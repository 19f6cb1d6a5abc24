//! Property-based tests for the shared containers and the AEAD wrapper.

use box_core::crypto::{decrypt, encrypt};
use box_core::{SharedList, SharedMap};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Tracked {
    id: u32,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn prop_map_last_set_wins() {
    proptest!(|(key in "[a-z]{0,12}", v1 in any::<u32>(), v2 in any::<u32>())| {
        let drops = Arc::new(AtomicUsize::new(0));
        let map = SharedMap::new();
        map.set(&key, Tracked { id: v1, drops: drops.clone() });
        map.set(&key, Tracked { id: v2, drops: drops.clone() });
        prop_assert_eq!(map.get(&key, |t| t.id), Some(v2));
        prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
        prop_assert_eq!(map.len(), 1);
    });
}

#[test]
fn prop_list_push_unshift_order() {
    proptest!(|(
        existing in proptest::collection::vec(any::<i32>(), 0..32),
        front in any::<i32>(),
        back in any::<i32>(),
    )| {
        let list = SharedList::new();
        for v in &existing {
            list.push(*v);
        }
        list.push(back);
        list.unshift(front);

        let mut expected = vec![front];
        expected.extend_from_slice(&existing);
        expected.push(back);

        let mut actual = Vec::new();
        list.for_each(|v| actual.push(*v));
        prop_assert_eq!(actual, expected);
    });
}

#[test]
fn prop_list_insert_then_remove_restores() {
    proptest!(|(
        existing in proptest::collection::vec(any::<i32>(), 0..32),
        x in any::<i32>(),
        seed in any::<usize>(),
    )| {
        let list = SharedList::new();
        for v in &existing {
            list.push(*v);
        }
        let index = seed % (existing.len() + 1);
        prop_assert!(list.insert(index, x).is_ok());
        prop_assert_eq!(list.len(), existing.len() + 1);
        prop_assert_eq!(list.remove_at(index), Some(x));
        prop_assert_eq!(list.len(), existing.len());
        for (i, v) in existing.iter().enumerate() {
            prop_assert_eq!(list.get_cloned(i), Some(*v));
        }
    });
}

#[test]
fn prop_aead_roundtrip() {
    proptest!(|(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 24]>(),
        ad in proptest::collection::vec(any::<u8>(), 0..64),
        plaintext in proptest::collection::vec(any::<u8>(), 0..1500),
    )| {
        let ct = encrypt(&key, &nonce, &ad, &plaintext).unwrap();
        prop_assert_eq!(ct.len(), plaintext.len() + 16);
        prop_assert_eq!(decrypt(&key, &nonce, &ad, &ct).unwrap(), plaintext);
    });
}
