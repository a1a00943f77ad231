//! Property tests for snapshot building and proof resolution
//!
//! Random allowlists are built at random shard widths, published to memory
//! and resolved back. Every entry must come back with a proof that reaches the
//! root, and nothing outside the list may resolve.

use std::collections::HashSet;

use ethereum_types::{H160, H256, U256};
use proptest::prelude::*;
use sharded_merkle::client::{InMemoryRegistry, MemoryStore};
use sharded_merkle::proofs::{verify_proof, MAX_SHARD_NYBBLES};
use sharded_merkle::{
    AirdropEntry, BuilderConfig, ProofResolver, ShardedSnapshot, ShardedSnapshotBuilder,
};

fn address() -> impl Strategy<Value = H160> {
    any::<[u8; 20]>()
        .prop_filter("zero address", |b| b != &[0u8; 20])
        .prop_map(H160::from)
}

fn allowlist() -> impl Strategy<Value = Vec<AirdropEntry>> {
    proptest::collection::hash_set(address(), 1..48).prop_flat_map(|recipients| {
        let n = recipients.len();
        (
            Just(recipients.into_iter().collect::<Vec<_>>()),
            proptest::collection::vec(any::<u64>(), n),
            any::<bool>(),
        )
            .prop_map(|(recipients, ids, erc1155)| {
                recipients
                    .into_iter()
                    .zip(ids)
                    .map(|(r, id)| {
                        if erc1155 {
                            AirdropEntry::erc1155(r, U256::from(id), U256::from(id % 1000 + 1))
                        } else {
                            AirdropEntry::erc721(r, U256::from(id))
                        }
                    })
                    .collect()
            })
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime")
}

fn publish(
    rt: &tokio::runtime::Runtime,
    entries: Vec<AirdropEntry>,
    nybbles: u8,
) -> (ShardedSnapshot, ProofResolver<MemoryStore, InMemoryRegistry>) {
    let snapshot = ShardedSnapshotBuilder::new(BuilderConfig::with_shard_nybbles(nybbles))
        .build(entries)
        .expect("Failed to build snapshot");
    let store = MemoryStore::new();
    let registry = InMemoryRegistry::new();
    rt.block_on(snapshot.publish(&store, &registry, "mem://drop", "mem://drop/info.json"))
        .expect("Failed to publish snapshot");
    (snapshot, ProofResolver::new(store, registry))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: every listed entry resolves to a proof that reaches the root.
    #[test]
    fn prop_inclusion_sound(entries in allowlist(), nybbles in 1u8..=3) {
        let rt = runtime();
        let (snapshot, resolver) = publish(&rt, entries.clone(), nybbles);

        for entry in &entries {
            let claim = rt
                .block_on(resolver.resolve(&snapshot.merkle_root, &entry.recipient()))
                .unwrap();
            let claim = claim.expect("listed recipient must resolve");
            prop_assert_eq!(&claim.entry, entry);
            prop_assert!(verify_proof(&snapshot.merkle_root, &entry.leaf(), &claim.proof));
            prop_assert!(claim.verify(&snapshot.merkle_root));
        }
    }

    /// Property: recipients outside the list never resolve.
    #[test]
    fn prop_exclusion(entries in allowlist(), strangers in proptest::collection::vec(address(), 1..8)) {
        let listed: HashSet<H160> = entries.iter().map(AirdropEntry::recipient).collect();
        let rt = runtime();
        let (snapshot, resolver) = publish(&rt, entries, 2);

        for stranger in strangers.iter().filter(|s| !listed.contains(s)) {
            let claim = rt
                .block_on(resolver.resolve(&snapshot.merkle_root, stranger))
                .unwrap();
            prop_assert!(claim.is_none());
        }
    }

    /// Property: a proof does not carry over to a modified entry.
    #[test]
    fn prop_tampered_entry_fails(entries in allowlist()) {
        let rt = runtime();
        let (snapshot, resolver) = publish(&rt, entries.clone(), 1);
        let entry = &entries[0];

        let claim = rt
            .block_on(resolver.resolve(&snapshot.merkle_root, &entry.recipient()))
            .unwrap()
            .expect("listed recipient must resolve");

        let bumped = match entry {
            AirdropEntry::Erc721(e) => {
                AirdropEntry::erc721(e.recipient, e.token_id + U256::one())
            }
            AirdropEntry::Erc1155(e) => {
                AirdropEntry::erc1155(e.recipient, e.token_id, e.amount + U256::one())
            }
        };
        prop_assert!(!verify_proof(&snapshot.merkle_root, &bumped.leaf(), &claim.proof));
        prop_assert!(!verify_proof(&H256::zero(), &entry.leaf(), &claim.proof));
    }

    /// Property: the root does not depend on the prefix width being chosen
    /// automatically or pinned to the same value.
    #[test]
    fn prop_auto_width_matches_pinned(entries in allowlist(), max_shard_size in 1usize..16) {
        let auto = ShardedSnapshotBuilder::new(BuilderConfig {
            shard_nybbles: None,
            max_shard_size,
        })
        .build(entries.clone())
        .unwrap();
        prop_assert!(auto.shard_nybbles <= MAX_SHARD_NYBBLES);

        let pinned = ShardedSnapshotBuilder::new(BuilderConfig::with_shard_nybbles(auto.shard_nybbles))
            .build(entries)
            .unwrap();
        prop_assert_eq!(auto.merkle_root, pinned.merkle_root);
    }
}
