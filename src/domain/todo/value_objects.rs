use serde::{Deserialize, Serialize};

// ============================================================================
// Todo Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TodoItem {
    pub id: i64,
    pub order: i64,
    pub title: String,
    pub completed: bool,
}

/// Client-supplied fields of an item; the id is assigned on add
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct TodoProps {
    pub order: i64,
    pub title: String,
    pub completed: bool,
}

impl TodoItem {
    pub fn from_props(id: i64, props: &TodoProps) -> Self {
        Self {
            id,
            order: props.order,
            title: props.title.clone(),
            completed: props.completed,
        }
    }

    pub fn props(&self) -> TodoProps {
        TodoProps {
            order: self.order,
            title: self.title.clone(),
            completed: self.completed,
        }
    }
}
