pub mod handler;
pub mod protocol;
pub mod server;
pub mod worker;

pub use handler::{Session, SessionState};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::TurnServer;
pub use worker::{TurnCommand, TurnEvent, TurnWorker, TurnWorkerHandle};
