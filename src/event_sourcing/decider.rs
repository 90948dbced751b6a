use crate::error::{Result, StoreError};

use super::core::SyncResult;
use super::resolver::Stream;

// ============================================================================
// Decider
// ============================================================================
//
// Orchestrates: Load → Decide → Append, re-deciding against the fresh state
// whenever another writer got there first.
//
// ============================================================================

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub struct Decider<E, S> {
    stream: Stream<E, S>,
    max_attempts: u32,
}

impl<E, S> Decider<E, S>
where
    E: Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    pub fn new(stream: Stream<E, S>) -> Self {
        Self::with_max_attempts(stream, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(stream: Stream<E, S>, max_attempts: u32) -> Self {
        Self {
            stream,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn query<R>(&self, render: impl FnOnce(&S) -> R) -> Result<R> {
        let (_token, state) = self.stream.load().await?;
        Ok(render(&state))
    }

    /// Run `decide` until its events are written; returns the decision result
    pub async fn transact<R>(&self, decide: impl Fn(&S) -> (R, Vec<E>)) -> Result<R> {
        let (result, _state) = self.run(decide).await?;
        Ok(result)
    }

    /// Like `transact`, then renders the state the events produced
    pub async fn transact_and_query<T>(
        &self,
        decide: impl Fn(&S) -> Vec<E>,
        render: impl FnOnce(&S) -> T,
    ) -> Result<T> {
        let ((), state) = self.run(|state| ((), decide(state))).await?;
        Ok(render(&state))
    }

    async fn run<R>(&self, decide: impl Fn(&S) -> (R, Vec<E>)) -> Result<(R, S)> {
        let (mut token, mut state) = self.stream.load().await?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (result, events) = decide(&state);

            match self.stream.try_sync(&token, state, events).await? {
                SyncResult::Written(_token, state) => return Ok((result, state)),
                SyncResult::Conflict(fresh_token, fresh_state) => {
                    if attempt >= self.max_attempts {
                        return Err(StoreError::MaxResyncsExhausted {
                            stream: self.stream.name().to_string(),
                            attempts: attempt,
                        });
                    }

                    tracing::debug!(
                        stream = %self.stream.name(),
                        attempt = attempt,
                        "Conflict, re-deciding against fresh state"
                    );
                    token = fresh_token;
                    state = fresh_state;
                }
            }
        }
    }
}
