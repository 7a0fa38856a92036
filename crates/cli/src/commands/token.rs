//! Bearer token minting.
//!
//! Tokens are signed with the same `JWT_SECRET` the server verifies with,
//! so a token printed here is accepted by a server sharing that environment.

use cartwheel_core::{Role, UserId};
use cartwheel_server::config::AuthConfig;
use cartwheel_server::models::CurrentUser;
use cartwheel_server::services::TokenService;
use tracing::info;

/// Print a signed token for `user_id` to stdout.
///
/// # Errors
///
/// Returns an error if the auth configuration is missing or weak, or if
/// signing fails.
pub fn issue(
    user_id: i32,
    role: Role,
    minutes: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AuthConfig::from_env()?;
    let tokens = TokenService::new(&config);
    let user = CurrentUser {
        id: UserId::new(user_id),
        role,
    };

    let token = match minutes {
        Some(minutes) => tokens.issue_with_lifetime(user, chrono::Duration::minutes(minutes))?,
        None => tokens.issue(user)?,
    };

    info!(user_id, %role, "Token issued");

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}
