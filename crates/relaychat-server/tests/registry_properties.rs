//! Property-based tests for ConnectionRegistry
//!
//! Random sequences of joins, departures and broadcasts are checked against a
//! simple model: every peer receives exactly the messages other peers sent
//! while it was registered, in order.

use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
};

use proptest::prelude::*;
use relaychat_server::{ConnectionId, ConnectionRegistry};

#[derive(Debug, Clone)]
enum Op {
    Join,
    Leave(usize),
    Send(usize, Vec<u8>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Join),
        any::<usize>().prop_map(Op::Leave),
        (any::<usize>(), prop::collection::vec(any::<u8>(), 1..32))
            .prop_map(|(who, payload)| Op::Send(who, payload)),
    ]
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(future)
}

fn addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 65432))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: delivery matches membership at the time of each broadcast
    #[test]
    fn prop_broadcast_follows_membership(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let (registry, expected) = run(async move {
            let mut registry = ConnectionRegistry::<Vec<u8>>::new();
            let mut expected: BTreeMap<ConnectionId, Vec<u8>> = BTreeMap::new();

            for op in ops {
                let ids = registry.peer_ids();
                match op {
                    Op::Join => {
                        let id = registry.register(Vec::new(), addr());
                        expected.insert(id, Vec::new());
                    },
                    Op::Leave(pick) if !ids.is_empty() => {
                        let id = ids[pick % ids.len()];
                        registry.unregister(id);
                        expected.remove(&id);
                    },
                    Op::Send(pick, payload) if !ids.is_empty() => {
                        let from = ids[pick % ids.len()];
                        let dropped = registry.broadcast(from, &payload).await;
                        assert!(dropped.is_empty());

                        for (id, received) in &mut expected {
                            if *id != from {
                                received.extend_from_slice(&payload);
                            }
                        }
                    },
                    _ => {},
                }
            }

            (registry, expected)
        });

        prop_assert_eq!(registry.peer_count(), expected.len());
        for (id, received) in &expected {
            prop_assert_eq!(registry.writer(*id).unwrap(), received);
        }
    }

    /// Property: IDs are unique across the registry's lifetime
    #[test]
    fn prop_ids_never_reused(pattern in prop::collection::vec(any::<bool>(), 1..100)) {
        let mut registry = ConnectionRegistry::<Vec<u8>>::new();
        let mut seen = HashSet::new();

        for join in pattern {
            if join {
                let id = registry.register(Vec::new(), addr());
                prop_assert!(seen.insert(id), "id {} issued twice", id);
            } else if let Some(id) = registry.peer_ids().first().copied() {
                registry.unregister(id);
            }
        }
    }
}
