pub mod store;
pub mod types;

pub use store::ContextStore;
pub use types::{Focus, Role, TurnContext, TurnRecord};
