//! Navigation guard for the routing collaborator.
//!
//! Three destinations are protected (home list, a conversation, settings):
//! they require a present current user. Onboarding is always public.
//! Rendering and navigation themselves live outside the core.

use crate::model::ConversationId;
use crate::store::ChatStore;

/// Application destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Onboarding,
    Home,
    Conversation(ConversationId),
    Settings,
}

impl Route {
    /// Whether this destination requires a signed-in user.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Onboarding)
    }
}

/// Apply the navigation guard: an absent current user redirects every
/// protected destination to onboarding.
#[must_use]
pub fn resolve(route: Route, store: &ChatStore) -> Route {
    if route.is_protected() && store.current_user().is_none() {
        return Route::Onboarding;
    }
    route
}
