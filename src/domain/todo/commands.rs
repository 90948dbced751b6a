use super::value_objects::TodoProps;

// ============================================================================
// Todo Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum TodoCommand {
    Add(TodoProps),
    Update { id: i64, props: TodoProps },
    Delete { id: i64 },
    Clear,
}
