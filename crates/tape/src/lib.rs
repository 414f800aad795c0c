pub mod store;

pub use store::{sanitize_session_id, EventStore, ListFilter};
