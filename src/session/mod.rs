pub mod workspace;

pub use workspace::{SessionId, SessionWorkspace};
