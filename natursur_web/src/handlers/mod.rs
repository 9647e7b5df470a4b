pub mod account;
pub mod admin;
pub mod booking;
pub mod public;

use natursur::domain::core::User;

use crate::{pages::Context, state::AppState};

fn context<'a>(state: &'a AppState, user: &'a Option<User>) -> Context<'a> {
    Context {
        studio: &state.config.studio,
        user: user.as_ref(),
    }
}
