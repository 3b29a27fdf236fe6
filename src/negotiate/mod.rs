//! Phase negotiation engine.
//!
//! A negotiation session lets a reviewer reshape a generated audit plan
//! before it runs. The session keeps an immutable copy of the original
//! phases, the current edited list, a skip set and an append-only log of
//! every applied operation.
//!
//! ## Module layout
//!
//! - `state`: [`NegotiationState`], the operation log and commit logic
//! - `validate`: pure precondition checks shared by every operation
//! - `renumber`: positional renumbering that preserves derived identity
//! - `field`: the closed set of fields `modify` may touch
//! - `ops`: split, merge, reorder, skip/unskip, modify and reset
//! - `batch`: typed commands and best-effort batch application
//! - `store`: JSON session records keyed by source hash

pub mod batch;
pub mod field;
pub mod ops;
pub mod renumber;
pub mod state;
pub mod store;
pub mod validate;

pub use batch::{BatchEntry, BatchReport, Command, OpDescriptor, apply_batch, load_batch};
pub use field::{FieldValue, ModifiableField};
pub use ops::ResetScope;
pub use state::{NegotiationOp, NegotiationState, OpOutcome, OpType, SessionDiff};
pub use store::{SessionStore, compute_source_hash};
