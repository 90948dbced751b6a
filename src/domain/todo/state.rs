use super::commands::TodoCommand;
use super::errors::TodoError;
use super::events::TodoEvent;
use super::value_objects::TodoItem;

// ============================================================================
// Todo State - folded from events, decided against by commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TodoState {
    /// Newest first
    pub items: Vec<TodoItem>,
    pub next_id: i64,
}

impl TodoState {
    pub fn initial() -> Self {
        Self::default()
    }

    fn evolve(mut self, event: &TodoEvent) -> Self {
        match event {
            TodoEvent::Added(item) => {
                self.items.insert(0, item.clone());
                self.next_id = self.next_id.max(item.id + 1);
            }
            TodoEvent::Updated(item) => {
                if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
                    *existing = item.clone();
                }
            }
            TodoEvent::Deleted { id } => self.items.retain(|i| i.id != *id),
            TodoEvent::Cleared { next_id } => {
                self.items.clear();
                self.next_id = *next_id;
            }
            TodoEvent::Snapshotted { next_id, items } => {
                self.items = items.clone();
                self.next_id = *next_id;
            }
        }
        self
    }

    pub fn find(&self, id: i64) -> Option<&TodoItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

pub fn fold(state: TodoState, events: &[TodoEvent]) -> TodoState {
    events.iter().fold(state, TodoState::evolve)
}

pub fn is_origin(event: &TodoEvent) -> bool {
    event.is_origin()
}

pub fn compact(state: &TodoState) -> TodoEvent {
    TodoEvent::Snapshotted {
        next_id: state.next_id,
        items: state.items.clone(),
    }
}

/// Events that carry out `command`; empty when it would change nothing
pub fn decide(command: &TodoCommand, state: &TodoState) -> Result<Vec<TodoEvent>, TodoError> {
    match command {
        TodoCommand::Add(props) => {
            if props.title.trim().is_empty() {
                return Err(TodoError::EmptyTitle);
            }
            Ok(vec![TodoEvent::Added(TodoItem::from_props(state.next_id, props))])
        }
        TodoCommand::Update { id, props } => {
            if props.title.trim().is_empty() {
                return Err(TodoError::EmptyTitle);
            }
            match state.find(*id) {
                Some(current) if current.props() != *props => {
                    Ok(vec![TodoEvent::Updated(TodoItem::from_props(*id, props))])
                }
                _ => Ok(vec![]),
            }
        }
        TodoCommand::Delete { id } => match state.find(*id) {
            Some(_) => Ok(vec![TodoEvent::Deleted { id: *id }]),
            None => Ok(vec![]),
        },
        TodoCommand::Clear => {
            if state.items.is_empty() {
                Ok(vec![])
            } else {
                Ok(vec![TodoEvent::Cleared { next_id: state.next_id }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::todo::TodoProps;

    fn props(title: &str) -> TodoProps {
        TodoProps {
            order: 0,
            title: title.to_string(),
            completed: false,
        }
    }

    fn apply(state: TodoState, command: TodoCommand) -> TodoState {
        let events = decide(&command, &state).unwrap();
        fold(state, &events)
    }

    #[test]
    fn test_add_assigns_sequential_ids_newest_first() {
        let state = apply(TodoState::initial(), TodoCommand::Add(props("a")));
        let state = apply(state, TodoCommand::Add(props("b")));

        let ids: Vec<i64> = state.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(state.next_id, 2);
    }

    #[test]
    fn test_empty_title_rejected() {
        let err = decide(&TodoCommand::Add(props("  ")), &TodoState::initial()).unwrap_err();
        assert_eq!(err, TodoError::EmptyTitle);
    }

    #[test]
    fn test_update_only_emits_on_change() {
        let state = apply(TodoState::initial(), TodoCommand::Add(props("a")));

        let unchanged = TodoCommand::Update { id: 0, props: props("a") };
        assert!(decide(&unchanged, &state).unwrap().is_empty());

        let missing = TodoCommand::Update { id: 9, props: props("z") };
        assert!(decide(&missing, &state).unwrap().is_empty());

        let state = apply(state, TodoCommand::Update { id: 0, props: props("renamed") });
        assert_eq!(state.find(0).unwrap().title, "renamed");
    }

    #[test]
    fn test_delete_and_clear() {
        let state = apply(TodoState::initial(), TodoCommand::Add(props("a")));
        let state = apply(state, TodoCommand::Add(props("b")));

        let state = apply(state, TodoCommand::Delete { id: 0 });
        assert!(state.find(0).is_none());
        assert!(decide(&TodoCommand::Delete { id: 0 }, &state).unwrap().is_empty());

        let state = apply(state, TodoCommand::Clear);
        assert!(state.items.is_empty());
        assert_eq!(state.next_id, 2);
        assert!(decide(&TodoCommand::Clear, &state).unwrap().is_empty());
    }

    #[test]
    fn test_compacted_event_reproduces_state() {
        let state = apply(TodoState::initial(), TodoCommand::Add(props("a")));
        let state = apply(state, TodoCommand::Add(props("b")));

        let snapshot = compact(&state);
        assert!(is_origin(&snapshot));
        assert_eq!(fold(TodoState::initial(), &[snapshot]), state);
    }

    #[test]
    fn test_cleared_is_a_valid_starting_point() {
        let state = fold(TodoState::initial(), &[TodoEvent::Cleared { next_id: 5 }]);
        let state = apply(state, TodoCommand::Add(props("c")));
        assert_eq!(state.find(5).unwrap().title, "c");
    }
}
