//! Role-gated navigation.
//!
//! These checks only decide what the user is shown.  Writes are authorized
//! by the store whatever the navigation layer allowed.

use serde::Serialize;
use tailtown_shared::types::Role;

use crate::session::AuthState;

const ANY_MEMBER: &[Role] = &[];
const LISTING_ROLES: &[Role] = &[Role::Seller, Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Home,
    Login,
    Signup,
    Pets,
    PetDetail,
    Dashboard,
    CreateListing,
    Favorites,
    Chats,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Pets => "/pets",
            Route::PetDetail => "/pets/:petId",
            Route::Dashboard => "/dashboard",
            Route::CreateListing => "/create-listing",
            Route::Favorites => "/favorites",
            Route::Chats => "/chats",
        }
    }

    /// `None` for public routes, `Some(&[])` for any signed-in user.
    pub fn allowed_roles(&self) -> Option<&'static [Role]> {
        match self {
            Route::Home | Route::Login | Route::Signup | Route::Pets | Route::PetDetail => None,
            Route::Dashboard | Route::Favorites | Route::Chats => Some(ANY_MEMBER),
            Route::CreateListing => Some(LISTING_ROLES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteDecision {
    /// Auth state not resolved yet.
    Pending,
    Allow,
    RedirectToLogin,
    /// Signed in with the wrong role; send to the dashboard.
    Unauthorized,
}

/// Decide whether `state` may view a route restricted to `allowed_roles`.
/// An empty slice admits any signed-in user.  A user whose profile could not
/// be loaded has no known role and is let through.
pub fn guard_route(state: &AuthState, allowed_roles: &[Role]) -> RouteDecision {
    match state {
        AuthState::Loading => RouteDecision::Pending,
        AuthState::SignedOut => RouteDecision::RedirectToLogin,
        AuthState::SignedIn(user) => match user.role() {
            Some(role) if !allowed_roles.is_empty() && !allowed_roles.contains(&role) => {
                RouteDecision::Unauthorized
            }
            _ => RouteDecision::Allow,
        },
    }
}

pub fn guard(state: &AuthState, route: Route) -> RouteDecision {
    match route.allowed_roles() {
        None => RouteDecision::Allow,
        Some(roles) => guard_route(state, roles),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAction {
    pub label: &'static str,
    pub route: Route,
}

const fn action(label: &'static str, route: Route) -> DashboardAction {
    DashboardAction { label, route }
}

/// Role-specific dashboard actions, followed by the links every user gets.
pub fn dashboard_actions(role: Option<Role>) -> Vec<DashboardAction> {
    let mut actions = match role {
        Some(Role::Seller) => vec![action("Create New Pet Listing", Route::CreateListing)],
        Some(Role::Buyer) => vec![action("Search for Pets", Route::Pets)],
        Some(Role::Admin) => vec![
            action("Browse/Search All Listings", Route::Pets),
            action("Create Listing (as Admin)", Route::CreateListing),
        ],
        None => Vec::new(),
    };
    actions.push(action("Browse All Available Pets", Route::Pets));
    actions.push(action("Back to Homepage", Route::Home));
    actions
}
