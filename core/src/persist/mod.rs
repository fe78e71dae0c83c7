//! Save, restore and undo.

mod codec;
mod snapshot;
mod undo;

pub use codec::{FORMAT_VERSION, decode_snapshot, encode_snapshot};
pub use snapshot::Snapshot;
pub use undo::UndoHistory;
