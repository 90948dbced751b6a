// ============================================================================
// Todo Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TodoError {
    #[error("Todo title cannot be empty")]
    EmptyTitle,
}
