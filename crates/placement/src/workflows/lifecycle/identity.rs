use axum::http::HeaderMap;

use super::domain::UserIdentity;
use super::store::IdentityProvider;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Identity asserted by the fronting gateway through request headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderIdentity {
    user: Option<UserIdentity>,
}

impl HeaderIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let user = header(USER_ID_HEADER).map(|id| UserIdentity {
            id,
            email: header(USER_EMAIL_HEADER).unwrap_or_default(),
        });
        Self { user }
    }
}

impl IdentityProvider for HeaderIdentity {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }
}
