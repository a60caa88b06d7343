use crate::types::{LoadingState, Role, Session, Tier};

/// A single screen the presentation layer can mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Login,
    Register,
    ForgotPassword,
    VerifyCode,
    ResetPassword,
    AdminDashboard,
    Waiting,
    SaverMenu,
    PremiumMenu,
    OrderConfirmation,
}

/// Which screen set to show for a given session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Restore has not finished; show only a loading indicator.
    Loading,
    Unauthenticated,
    Admin,
    /// Customer without an assigned tier (or a tier this client does not know).
    Waiting,
    SaverMenu,
    PremiumMenu,
}

impl Route {
    /// Screens reachable under this route, first one is the entry screen.
    #[must_use]
    pub fn screens(self) -> &'static [Screen] {
        match self {
            Self::Loading => &[],
            Self::Unauthenticated => &[
                Screen::Login,
                Screen::Register,
                Screen::ForgotPassword,
                Screen::VerifyCode,
                Screen::ResetPassword,
            ],
            Self::Admin => &[Screen::AdminDashboard],
            Self::Waiting => &[Screen::Waiting],
            Self::SaverMenu => &[Screen::SaverMenu, Screen::OrderConfirmation],
            Self::PremiumMenu => &[Screen::PremiumMenu, Screen::OrderConfirmation],
        }
    }

    /// Whether the tier should be polled while this route is shown.
    #[must_use]
    pub fn polls_tier(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

/// Select the screen set for `session`. Pure.
#[must_use]
pub fn derive_route(session: &Session) -> Route {
    if session.loading_state() == LoadingState::Initializing {
        return Route::Loading;
    }
    let Some(active) = &session.active else {
        return Route::Unauthenticated;
    };
    let user = active.user();
    if user.role == Role::Admin {
        return Route::Admin;
    }
    match user.tier {
        Tier::Saver => Route::SaverMenu,
        Tier::Premium => Route::PremiumMenu,
        Tier::Pending | Tier::Other(_) => Route::Waiting,
    }
}
