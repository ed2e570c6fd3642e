//! Driven port for the external identity provider.
//!
//! The provider owns credentials and sessions; the core only consumes a
//! stable principal (subject id + email) and a change stream that fires on
//! sign-in and sign-out.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::watch;

use crate::domain::Principal;

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// The provider could not be reached.
        Unavailable { message: String } => "identity provider unavailable: {message}",
    }
}

/// Abstract identity provider consumed by the identity resolver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently authenticated principal, if any.
    async fn current_principal(&self) -> Result<Option<Principal>, IdentityProviderError>;

    /// Stream of authentication changes; yields the new principal on
    /// sign-in and `None` on sign-out.
    fn auth_changes(&self) -> BoxStream<'static, Option<Principal>>;

    /// Terminate the provider-side session.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;
}

/// In-memory identity provider used by tests and local tooling.
#[derive(Debug)]
pub struct FixtureIdentityProvider {
    sender: watch::Sender<Option<Principal>>,
}

impl FixtureIdentityProvider {
    /// Start signed out.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Simulate a sign-in event.
    pub fn sign_in(&self, principal: Principal) {
        self.sender.send_replace(Some(principal));
    }
}

impl Default for FixtureIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for FixtureIdentityProvider {
    async fn current_principal(&self) -> Result<Option<Principal>, IdentityProviderError> {
        Ok(self.sender.borrow().clone())
    }

    fn auth_changes(&self) -> BoxStream<'static, Option<Principal>> {
        let receiver = self.sender.subscribe();
        futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.changed().await.ok()?;
            let value = receiver.borrow_and_update().clone();
            Some((value, receiver))
        })
        .boxed()
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        self.sender.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{EmailAddress, UserId};

    fn principal() -> Principal {
        Principal::new(
            UserId::new("uid-1").expect("fixture id"),
            EmailAddress::new("student@x.edu").expect("fixture email"),
        )
    }

    #[tokio::test]
    async fn fixture_reports_sign_in_and_out() {
        let provider = FixtureIdentityProvider::new();
        assert_eq!(provider.current_principal().await.expect("no failure"), None);

        let mut changes = provider.auth_changes();
        provider.sign_in(principal());
        assert_eq!(changes.next().await, Some(Some(principal())));

        provider.sign_out().await.expect("sign out succeeds");
        assert_eq!(changes.next().await, Some(None));
        assert_eq!(provider.current_principal().await.expect("no failure"), None);
    }
}
