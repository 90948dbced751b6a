// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, events,
// commands, errors, state and a service binding it to a store context.
//
// This layer only sees the event sourcing infrastructure through resolvers.
//
// ============================================================================

pub mod todo;
