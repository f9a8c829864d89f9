pub mod store;

pub use store::{SignalHistory, StoredSignal};
