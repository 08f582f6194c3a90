use async_trait::async_trait;

use super::{ClientError, DeskClient};
use crate::cache::{Clock, Storage};
use crate::database::models::PublicUser;

/// What a guarded view resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView<T> {
    Protected(T),
    LoginPrompt,
}

impl<T> GateView<T> {
    pub fn is_protected(&self) -> bool {
        matches!(self, GateView::Protected(_))
    }
}

/// Something that can ask the server who the caller is
#[async_trait]
pub trait IdentitySource: Send {
    async fn fetch_identity(&mut self) -> Result<Option<PublicUser>, ClientError>;
}

#[async_trait]
impl<S, C> IdentitySource for DeskClient<S, C>
where
    S: Storage + Send,
    C: Clock + Send,
{
    async fn fetch_identity(&mut self) -> Result<Option<PublicUser>, ClientError> {
        self.current_user().await
    }
}

/// Route guard for protected views.
///
/// Asks the server on every render and keeps no decision of its own, so a
/// session revoked server-side is noticed on the next render.
pub struct AuthGate<I> {
    source: I,
}

impl<I: IdentitySource> AuthGate<I> {
    pub fn new(source: I) -> Self {
        Self { source }
    }

    pub fn source_mut(&mut self) -> &mut I {
        &mut self.source
    }

    pub fn into_inner(self) -> I {
        self.source
    }

    /// Build the protected content for the current user, or the login prompt
    /// when there is none. Network failures also show the prompt.
    pub async fn render<T, F>(&mut self, content: F) -> GateView<T>
    where
        F: FnOnce(&PublicUser) -> T,
    {
        match self.source.fetch_identity().await {
            Ok(Some(user)) => GateView::Protected(content(&user)),
            Ok(None) => GateView::LoginPrompt,
            Err(e) => {
                tracing::warn!("Identity check failed, showing login prompt: {}", e);
                GateView::LoginPrompt
            }
        }
    }
}
