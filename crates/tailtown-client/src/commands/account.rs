use serde::Serialize;
use tailtown_shared::types::Role;
use tracing::info;

use crate::error::ClientError;
use crate::session::CurrentUser;
use crate::state::ClientState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Option<String>,
}

impl From<&CurrentUser> for AccountDto {
    fn from(user: &CurrentUser) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            display_name: user.display_name().to_string(),
            role: user.role().map(|r| r.as_str().to_string()),
        }
    }
}

/// Register and sign in.  Returns once the session context reflects the new
/// user.
pub async fn sign_up(
    state: &ClientState,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
) -> Result<AccountDto, ClientError> {
    let role: Role = role
        .trim()
        .parse()
        .map_err(|_| ClientError::invalid(format!("Unknown role: {}", role.trim())))?;

    let (session, _) = state.auth.register(email, password, name, role).await?;
    let user = state.session.signed_in_as(&session.uid).await?;
    Ok(AccountDto::from(&user))
}

pub async fn sign_in(
    state: &ClientState,
    email: &str,
    password: &str,
) -> Result<AccountDto, ClientError> {
    let session = state.auth.login(email, password).await?;
    let user = state.session.signed_in_as(&session.uid).await?;
    info!(uid = %user.uid, "session ready");
    Ok(AccountDto::from(&user))
}

pub async fn sign_out(state: &ClientState) -> Result<(), ClientError> {
    state.auth.logout();
    state.session.signed_out().await
}

pub fn who_am_i(state: &ClientState) -> Option<AccountDto> {
    state.session.current_user().as_ref().map(AccountDto::from)
}
