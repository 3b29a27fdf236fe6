pub mod config;
pub mod errors;
pub mod logging;
pub mod negotiate;
pub mod parser;
pub mod phase;
pub mod render;
pub mod ui;

pub use errors::{NegotiationError, StoreError};
pub use negotiate::{NegotiationState, ResetScope, SessionStore};
pub use phase::{FileAction, FileChange, Phase};
