// ============================================================================
// Todo Domain - one list of items per client
// ============================================================================
//
// - Value objects (TodoItem, TodoProps)
// - Events (Added, Updated, Deleted, Cleared, Snapshotted)
// - Commands (Add, Update, Delete, Clear)
// - Errors (TodoError)
// - State (fold, decide, snapshot functions)
// - Service (TodoService over a resolver)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod state;
pub mod service;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use state::TodoState;
pub use service::*;
