//! Property check: join inlining changes round trips, never results.

use super::{OptimizeOptions, StepRewrite, optimize_step};
use crate::{
    plan::PlanGraph,
    row::EntityRow,
    step::ActivationInputs,
    test_support::{MemStore, fixtures},
    trace::ExecContext,
    value::Value,
};
use proptest::prelude::*;

fn store_with(users: &[i64], interests: &[(i64, i64)]) -> MemStore {
    let mut store = MemStore::new();
    for id in users {
        store.insert(
            "user",
            &[
                ("id", Value::Int(*id)),
                ("fullName", Value::Text(format!("user-{id}"))),
            ],
        );
    }
    for (n, (event, user)) in interests.iter().enumerate() {
        store.insert(
            "event_interest",
            &[
                ("id", Value::Int(i64::try_from(n).unwrap())),
                ("eventId", Value::Int(*event)),
                ("userId", Value::Int(*user)),
                ("rsvp", Value::Text("yes".into())),
            ],
        );
    }

    store
}

// Resolve, per event and per interest item, the related user's fullName —
// through the inlined nested row or through the independent child fetch,
// depending on what the optimizer did.
fn users_per_interest(
    inline: bool,
    store: &MemStore,
    event_ids: &[Value],
) -> Vec<Vec<Option<Value>>> {
    let mut graph = PlanGraph::new();
    let event_input = graph.input();
    let interests = graph
        .fetch(fixtures::EVENT_INTEREST, &[("eventId", event_input)], false)
        .unwrap();
    let interest_record = graph.item_record(interests).unwrap();
    let user_id = graph.record_get(interest_record, "userId").unwrap();
    let users = graph.fetch(fixtures::USER, &[("id", user_id)], false).unwrap();
    let user_record = graph.single(users).unwrap();
    graph.record_get(user_record, "fullName").unwrap();
    graph.record_optimize(user_record).unwrap();
    graph.record_optimize(interest_record).unwrap();

    let options = if inline {
        OptimizeOptions::default()
    } else {
        OptimizeOptions::default().without_inline_joins()
    };
    let child_rewrite = optimize_step(&mut graph, users, &options).unwrap();
    optimize_step(&mut graph, interests, &options).unwrap();

    let ctx = ExecContext::new();
    let mut inputs = ActivationInputs::new();
    inputs.set(0, event_ids);
    let parent_lists = graph
        .fetch_ref(interests)
        .unwrap()
        .execute(event_ids.len(), &inputs, store, &ctx)
        .unwrap();

    if matches!(child_rewrite, StepRewrite::InlinedInto { .. }) {
        return parent_lists
            .iter()
            .map(|list| {
                list.iter()
                    .map(|row| {
                        row.nested("user")
                            .unwrap()
                            .as_ref()
                            .and_then(|user| user.get("fullName").cloned())
                    })
                    .collect()
            })
            .collect();
    }

    let items: Vec<&EntityRow> = parent_lists.iter().flatten().collect();
    let user_ids: Vec<Value> = items
        .iter()
        .map(|row| row.get("userId").cloned().unwrap())
        .collect();
    let mut child_inputs = ActivationInputs::new();
    child_inputs.set(0, &user_ids);
    let child_lists = graph
        .fetch_ref(users)
        .unwrap()
        .execute(items.len(), &child_inputs, store, &ctx)
        .unwrap();

    let mut out = Vec::with_capacity(parent_lists.len());
    let mut cursor = 0;
    for list in &parent_lists {
        let mut per_event = Vec::with_capacity(list.len());
        for _ in list {
            per_event.push(
                child_lists[cursor]
                    .first()
                    .and_then(|user| user.get("fullName").cloned()),
            );
            cursor += 1;
        }
        out.push(per_event);
    }

    out
}

proptest! {
    #[test]
    fn inlining_preserves_observable_results(
        users in proptest::collection::btree_set(0i64..8, 0..6),
        interests in proptest::collection::vec((0i64..4, 0i64..8), 0..12),
    ) {
        let users: Vec<i64> = users.into_iter().collect();
        let store_inlined = store_with(&users, &interests);
        let store_independent = store_with(&users, &interests);
        let event_ids = [Value::Int(0), Value::Int(1), Value::Int(2)];

        let with_inlining = users_per_interest(true, &store_inlined, &event_ids);
        let without_inlining = users_per_interest(false, &store_independent, &event_ids);

        prop_assert_eq!(with_inlining, without_inlining);
        prop_assert!(store_inlined.round_trips() <= store_independent.round_trips());
    }
}
