//! Property tests for room invariants under arbitrary operation sequences.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use rollroom_dice::RandomRoller;
use rollroom_room::{outbox, Registry, RoomConfig, RoomError, SessionId};

const USERS: [&str; 4] = ["ana", "bo", "cy", "di"];

#[derive(Debug, Clone)]
enum Op {
    Join(usize),
    Toggle(usize),
    Leave(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..USERS.len()).prop_map(Op::Join),
        (0..USERS.len()).prop_map(Op::Toggle),
        (0..USERS.len()).prop_map(Op::Leave),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn room_invariants_hold(ops in prop::collection::vec(op(), 1..60)) {
        let registry = Registry::new(RoomConfig::default(), Arc::new(RandomRoller));
        // user -> attached session
        let mut attached: HashMap<usize, SessionId> = HashMap::new();
        // room generation state, reset whenever the room is removed
        let mut version = 0u64;
        let mut next_id = 0u64;
        let mut known: HashMap<usize, bool> = HashMap::new();

        for op in ops {
            match op {
                Op::Join(u) => {
                    let session = SessionId::next();
                    let result =
                        registry.join("prop", session, USERS[u], "", outbox().0);
                    if attached.contains_key(&u) {
                        prop_assert!(matches!(result, Err(RoomError::NameTaken(_))));
                        continue;
                    }
                    let (_, outcome) = result.unwrap();
                    version += 1;
                    prop_assert_eq!(outcome.id, next_id);
                    prop_assert_eq!(outcome.snapshot.version, version);
                    prop_assert!((1..=20).contains(&outcome.value));
                    next_id += 1;
                    attached.insert(u, session);
                    known.insert(u, false);
                }
                Op::Toggle(u) => {
                    let Some(room) = registry.get("prop") else {
                        prop_assert!(attached.is_empty());
                        continue;
                    };
                    match room.toggle_done(USERS[u]) {
                        Ok(snap) => {
                            version += 1;
                            let done = known.get_mut(&u).unwrap();
                            *done = !*done;
                            prop_assert_eq!(snap.version, version);
                            prop_assert_eq!(
                                snap.result_for(USERS[u]).unwrap().is_done,
                                *done
                            );
                        }
                        Err(RoomError::UnknownUser(_)) => {
                            prop_assert!(!known.contains_key(&u));
                        }
                        Err(e) => prop_assert!(false, "unexpected error {e}"),
                    }
                }
                Op::Leave(u) => {
                    let Some(session) = attached.remove(&u) else {
                        continue;
                    };
                    let room = registry.get("prop").unwrap();
                    let closed = room.detach(session);
                    prop_assert_eq!(closed, attached.is_empty());
                    prop_assert_eq!(room.version(), version);
                    if closed {
                        prop_assert!(registry.get("prop").is_none());
                        version = 0;
                        next_id = 0;
                        known.clear();
                    }
                }
            }

            if let Some(room) = registry.get("prop") {
                let snap = room.snapshot();
                prop_assert_eq!(snap.version, version);
                prop_assert_eq!(snap.results.len(), known.len());
                prop_assert_eq!(room.session_count(), attached.len());
                for pair in snap.results.windows(2) {
                    prop_assert!(
                        pair[0].value > pair[1].value
                            || (pair[0].value == pair[1].value
                                && pair[0].id < pair[1].id)
                    );
                }
            }
        }
    }
}
