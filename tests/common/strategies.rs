//! Proptest strategies for command batches

use proptest::prelude::*;

/// HTTP status the mock transport answers with
pub fn status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        3 => Just(200u16),
        1 => Just(204u16),
        2 => 400u16..500,
        2 => 500u16..600,
    ]
}

/// Per-command statuses for one batch
pub fn batch_statuses_strategy() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(status_strategy(), 0..24)
}

pub fn pool_size_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}
