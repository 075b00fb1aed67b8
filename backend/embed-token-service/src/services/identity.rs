//! Row-level security identity construction
use std::collections::BTreeSet;

use crate::models::{Identity, ReportDescriptor, RlsIdentity};

/// True when the caller supplied no usable user identifier.
///
/// Front-ends serialize a missing user as the literal string `"null"`, so it is
/// treated the same as absence.
pub fn is_placeholder_user_id(user_id: Option<&str>) -> bool {
    match user_id.map(str::trim) {
        None => true,
        Some(value) => value.is_empty() || value.eq_ignore_ascii_case("null"),
    }
}

/// Builds RLS identities bound to a fixed role set.
#[derive(Debug, Clone)]
pub struct IdentityScoper {
    roles: BTreeSet<String>,
}

impl IdentityScoper {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles
                .into_iter()
                .map(Into::into)
                .filter(|r: &String| !r.trim().is_empty())
                .collect(),
        }
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Scopes the identity to the dataset of `report` and nothing else.
    pub fn scope(&self, user_id: Option<&str>, report: &ReportDescriptor) -> Identity {
        if is_placeholder_user_id(user_id) {
            return Identity::None;
        }

        let username = user_id.map(str::trim).unwrap_or_default().to_string();

        Identity::Scoped(RlsIdentity {
            username,
            roles: self.roles.clone(),
            datasets: BTreeSet::from([report.dataset_id.clone()]),
        })
    }
}
