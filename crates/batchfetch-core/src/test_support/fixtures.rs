//! Static entity fixtures and seed data for an events domain.

use crate::{
    model::{ColumnKind, ColumnModel, EntityModel, RelationModel},
    test_support::store::MemStore,
    value::Value,
};

static USER_MODEL: EntityModel = EntityModel {
    path: "fixtures::User",
    entity_name: "User",
    table: "user",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::new("fullName", ColumnKind::Text),
        ColumnModel::new("username", ColumnKind::Text),
        ColumnModel::new("picture", ColumnKind::Text),
        ColumnModel::new("createdAt", ColumnKind::Timestamp),
    ],
    primary_key: &["id"],
    relations: &[],
};
pub const USER: &EntityModel = &USER_MODEL;

static VENUE_MODEL: EntityModel = EntityModel {
    path: "fixtures::Venue",
    entity_name: "Venue",
    table: "venue",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::new("name", ColumnKind::Text),
    ],
    primary_key: &["id"],
    relations: &[],
};
pub const VENUE: &EntityModel = &VENUE_MODEL;

static EVENT_MODEL: EntityModel = EntityModel {
    path: "fixtures::Event",
    entity_name: "Event",
    table: "event",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::new("name", ColumnKind::Text),
        ColumnModel::new("venueId", ColumnKind::Int),
        ColumnModel::new("tags", ColumnKind::Unsupported),
    ],
    primary_key: &["id"],
    relations: &[RelationModel {
        name: "venue",
        target: VENUE,
        columns: &[("venueId", "id")],
        unique: true,
    }],
};
pub const EVENT: &EntityModel = &EVENT_MODEL;

static EVENT_INTEREST_MODEL: EntityModel = EntityModel {
    path: "fixtures::EventInterest",
    entity_name: "EventInterest",
    table: "event_interest",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::new("rsvp", ColumnKind::Text),
        ColumnModel::new("eventId", ColumnKind::Int),
        ColumnModel::new("userId", ColumnKind::Int),
    ],
    primary_key: &["id"],
    relations: &[
        RelationModel {
            name: "event",
            target: EVENT,
            columns: &[("eventId", "id")],
            unique: true,
        },
        RelationModel {
            name: "user",
            target: USER,
            columns: &[("userId", "id")],
            unique: true,
        },
        // Deliberately identical to `user`: exercises the declaration-order
        // tie-break for ambiguous relation matches.
        RelationModel {
            name: "attendee",
            target: USER,
            columns: &[("userId", "id")],
            unique: true,
        },
    ],
};
pub const EVENT_INTEREST: &EntityModel = &EVENT_INTEREST_MODEL;

static FRIENDSHIP_MODEL: EntityModel = EntityModel {
    path: "fixtures::Friendship",
    entity_name: "Friendship",
    table: "friendship",
    columns: &[
        ColumnModel::new("userId", ColumnKind::Int),
        ColumnModel::new("friendId", ColumnKind::Int),
    ],
    primary_key: &["userId", "friendId"],
    relations: &[
        RelationModel {
            name: "user",
            target: USER,
            columns: &[("userId", "id")],
            unique: true,
        },
        RelationModel {
            name: "friend",
            target: USER,
            columns: &[("friendId", "id")],
            unique: true,
        },
    ],
};
pub const FRIENDSHIP: &EntityModel = &FRIENDSHIP_MODEL;

// `email` compares case-insensitively in the store, so it opts out of the
// known-value short-circuit.
static ACCOUNT_MODEL: EntityModel = EntityModel {
    path: "fixtures::Account",
    entity_name: "Account",
    table: "account",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::inexact("email", ColumnKind::Text),
    ],
    primary_key: &["id"],
    relations: &[],
};
pub const ACCOUNT: &EntityModel = &ACCOUNT_MODEL;

static TAG_MODEL: EntityModel = EntityModel {
    path: "fixtures::Tag",
    entity_name: "Tag",
    table: "tag",
    columns: &[
        ColumnModel::new("id", ColumnKind::Int),
        ColumnModel::new("name", ColumnKind::Text),
    ],
    primary_key: &["id"],
    relations: &[],
};
pub const TAG: &EntityModel = &TAG_MODEL;

/// A store seeded with a small events domain: users 1 and 3 exist (2 does
/// not), event 100 has a venue while 101 has none.
pub fn seeded_store() -> MemStore {
    let mut store = MemStore::new();

    store.insert(
        "user",
        &[
            ("id", Value::Int(1)),
            ("fullName", Value::Text("Ada Lovelace".into())),
            ("username", Value::Text("ada".into())),
            ("createdAt", Value::Int(1_700_000_000)),
        ],
    );
    store.insert(
        "user",
        &[
            ("id", Value::Int(3)),
            ("fullName", Value::Text("Grace Hopper".into())),
            ("username", Value::Text("grace".into())),
            ("createdAt", Value::Int(1_700_000_100)),
        ],
    );

    store.insert("venue", &[("id", Value::Int(1)), ("name", Value::Text("The Pit".into()))]);

    store.insert(
        "event",
        &[
            ("id", Value::Int(100)),
            ("name", Value::Text("RustConf".into())),
            ("venueId", Value::Int(1)),
        ],
    );
    store.insert(
        "event",
        &[
            ("id", Value::Int(101)),
            ("name", Value::Text("Hallway Track".into())),
            ("venueId", Value::Null),
        ],
    );

    store.insert(
        "event_interest",
        &[
            ("id", Value::Int(1000)),
            ("eventId", Value::Int(100)),
            ("userId", Value::Int(1)),
            ("rsvp", Value::Text("yes".into())),
        ],
    );
    store.insert(
        "event_interest",
        &[
            ("id", Value::Int(1001)),
            ("eventId", Value::Int(100)),
            ("userId", Value::Int(3)),
            ("rsvp", Value::Text("interested".into())),
        ],
    );
    store.insert(
        "event_interest",
        &[
            ("id", Value::Int(1002)),
            ("eventId", Value::Int(101)),
            ("userId", Value::Int(1)),
            ("rsvp", Value::Text("no".into())),
        ],
    );

    // Dangling interest: its user does not exist.
    store.insert(
        "event_interest",
        &[
            ("id", Value::Int(1003)),
            ("eventId", Value::Int(102)),
            ("userId", Value::Int(9)),
            ("rsvp", Value::Text("maybe".into())),
        ],
    );

    store.insert("tag", &[("id", Value::Int(1)), ("name", Value::Text("rust".into()))]);
    store.insert("tag", &[("id", Value::Int(2)), ("name", Value::Text("databases".into()))]);

    store
}
