use async_trait::async_trait;

/// A single read-side query against a projection store or, for the aggregate
/// read path, against the repository.
///
/// Queries are self-contained: they are constructed with whatever store handle
/// they need and never write anything.
#[async_trait]
pub trait Query: Send + Sync {
    type Output;

    async fn apply(&self) -> Self::Output;
}

/// A trait for running queries.
///
/// The default `run` just applies the query; implementors exist so an
/// application can have one value representing its whole read side.
#[async_trait]
pub trait QueriesRunner {
    async fn run<Q>(&self, query: &Q) -> Q::Output
    where
        Q: Query,
    {
        query.apply().await
    }
}
