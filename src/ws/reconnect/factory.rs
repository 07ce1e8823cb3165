use std::future::Future;

use crate::ws::transport::Target;

/// Boxed error of a [`TargetFactory`].
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Produce the target of each connection attempt.
///
/// Called once per [`ReconnectingClient::connect`](super::ReconnectingClient::connect),
/// so every attempt can use fresh parameters, for example a new auth token.
///
/// Any `Fn() -> impl Future<Output = Result<Target, E>>` is a factory.
#[async_trait::async_trait]
pub trait TargetFactory: Send + Sync + 'static {
    /// target of the next attempt
    async fn make_target(&self) -> Result<Target, FactoryError>;
}

#[async_trait::async_trait]
impl<F, Fut, E> TargetFactory for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Target, E>> + Send,
    E: Into<FactoryError>,
{
    async fn make_target(&self) -> Result<Target, FactoryError> {
        self().await.map_err(Into::into)
    }
}

/// Factory always producing the same target.
#[derive(Debug, Clone)]
pub struct FixedTarget(pub Target);

#[async_trait::async_trait]
impl TargetFactory for FixedTarget {
    async fn make_target(&self) -> Result<Target, FactoryError> {
        Ok(self.0.clone())
    }
}
