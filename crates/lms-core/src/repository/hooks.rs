//! Repository lifecycle hooks

use async_trait::async_trait;

use crate::error::CoreError;

/// Steps run around repository mutations.
///
/// A `before_*` error vetoes the operation before any network call. An
/// `after_*` error is returned to the caller, but the mutation has already
/// happened and the cache has already been invalidated.
#[async_trait]
pub trait RepositoryHooks<T, C, U>: Send + Sync
where
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    async fn before_create(&self, _data: &mut C) -> Result<(), CoreError> {
        Ok(())
    }

    async fn after_create(&self, _entity: &T) -> Result<(), CoreError> {
        Ok(())
    }

    async fn before_update(&self, _id: &str, _data: &mut U) -> Result<(), CoreError> {
        Ok(())
    }

    async fn after_update(&self, _entity: &T) -> Result<(), CoreError> {
        Ok(())
    }

    async fn before_delete(&self, _id: &str) -> Result<(), CoreError> {
        Ok(())
    }

    async fn after_delete(&self, _id: &str) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<T, C, U> RepositoryHooks<T, C, U> for NoHooks
where
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
}
