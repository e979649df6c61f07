mod manager;
mod state;

pub use manager::VideoList;
pub use state::{AddOutcome, ListEntry, ListError, ListState, RecheckSummary};
