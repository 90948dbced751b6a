use std::sync::Arc;

use uuid::Uuid;

use crate::context::StoreContext;
use crate::event_sourcing::core::{Compact, Fold, IsOrigin, JsonCodec, Target};
use crate::event_sourcing::{Decider, Resolver};

use super::commands::TodoCommand;
use super::events::TodoEvent;
use super::state::{self, TodoState};
use super::value_objects::{TodoItem, TodoProps};

// ============================================================================
// Todo Service
// ============================================================================
//
// One stream per client: Todos-{client_id}
// Command → Decider (load, decide, append, retry on conflict) → rendered item
//
// ============================================================================

pub const CATEGORY: &str = "Todos";

#[derive(Clone)]
pub struct TodoService {
    resolver: Resolver<TodoEvent, TodoState>,
}

impl TodoService {
    pub fn new(resolver: Resolver<TodoEvent, TodoState>) -> Self {
        Self { resolver }
    }

    /// Todo resolver over `context`, snapshotting the whole list on every append
    pub fn resolver(context: &StoreContext) -> Resolver<TodoEvent, TodoState> {
        let fold: Fold<TodoEvent, TodoState> = Arc::new(state::fold);
        let is_origin: IsOrigin<TodoEvent> = Arc::new(state::is_origin);
        let compact: Compact<TodoEvent, TodoState> = Arc::new(state::compact);

        context.resolve(
            Arc::new(JsonCodec::<TodoEvent>::new()),
            fold,
            TodoState::initial(),
            Some(is_origin),
            Some(compact),
        )
    }

    fn decider(&self, client_id: Uuid) -> Decider<TodoEvent, TodoState> {
        Decider::new(self.resolver.resolve(Target::aggregate(CATEGORY, client_id)))
    }

    async fn execute<R>(
        &self,
        client_id: Uuid,
        command: TodoCommand,
        render: impl Fn(&TodoState, &[TodoEvent]) -> R,
    ) -> anyhow::Result<R> {
        let outcome = self
            .decider(client_id)
            .transact(|state| match state::decide(&command, state) {
                Ok(events) => {
                    let rendered = render(state, &events);
                    (Ok(rendered), events)
                }
                Err(e) => (Err(e), Vec::new()),
            })
            .await?;
        Ok(outcome?)
    }

    pub async fn list(&self, client_id: Uuid) -> anyhow::Result<Vec<TodoItem>> {
        Ok(self.decider(client_id).query(|s| s.items.clone()).await?)
    }

    pub async fn try_get(&self, client_id: Uuid, id: i64) -> anyhow::Result<Option<TodoItem>> {
        Ok(self.decider(client_id).query(|s| s.find(id).cloned()).await?)
    }

    pub async fn create(&self, client_id: Uuid, props: TodoProps) -> anyhow::Result<TodoItem> {
        let created = self
            .execute(client_id, TodoCommand::Add(props), |_, events| match events.first() {
                Some(TodoEvent::Added(item)) => Some(item.clone()),
                _ => None,
            })
            .await?
            .ok_or_else(|| anyhow::anyhow!("Add produced no item"))?;

        tracing::debug!(client_id = %client_id, id = created.id, "Todo created");
        Ok(created)
    }

    /// `None` when there is no item with `id`
    pub async fn patch(&self, client_id: Uuid, id: i64, props: TodoProps) -> anyhow::Result<Option<TodoItem>> {
        self.execute(client_id, TodoCommand::Update { id, props }, |state, events| {
            match events.first() {
                Some(TodoEvent::Updated(item)) => Some(item.clone()),
                _ => state.find(id).cloned(),
            }
        })
        .await
    }

    pub async fn delete(&self, client_id: Uuid, id: i64) -> anyhow::Result<()> {
        self.execute(client_id, TodoCommand::Delete { id }, |_, _| ()).await
    }

    pub async fn clear(&self, client_id: Uuid) -> anyhow::Result<()> {
        self.execute(client_id, TodoCommand::Clear, |_, _| ()).await
    }
}
