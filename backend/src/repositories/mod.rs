pub mod state_repo;

pub use state_repo::{
    load_typed, save_typed, InMemoryStateStore, SqlxStateStore, StateSlot, StateStore,
};
