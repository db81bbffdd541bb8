//! Authentication domain models.

use serde::{Deserialize, Serialize};

/// The GitHub user a token was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Display name.
    pub name: String,
    pub avatar_url: String,
    /// GitHub user ID, kept opaque.
    pub id: String,
}

/// Payload embedded under the `data` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsData {
    pub user: UserIdentity,
}

/// JWT claims embedded in Relay tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Issuer set: installation IDs (as strings) the bearer may act on.
    pub iss: Vec<String>,
    pub data: ClaimsData,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

impl AuthClaims {
    /// Installation IDs from the issuer set, skipping anything non-numeric.
    pub fn installation_ids(&self) -> Vec<i64> {
        self.iss.iter().filter_map(|i| i.parse().ok()).collect()
    }

    /// Whether `iid` is a member of the issuer set.
    pub fn can_access(&self, iid: i64) -> bool {
        let wanted = iid.to_string();
        self.iss.iter().any(|i| *i == wanted)
    }

    pub fn user(&self) -> &UserIdentity {
        &self.data.user
    }
}
