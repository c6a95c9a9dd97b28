// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication adapter trait for the admin and agent surfaces.

use async_trait::async_trait;

use crate::error::MessengerError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AuthIdentity, AuthToken, PermissionAction};

/// Adapter that resolves bearer credentials to identities and checks grants.
#[async_trait]
pub trait AuthAdapter: PluginAdapter {
    /// Authenticates the given token and returns the verified identity.
    ///
    /// Unknown tokens yield [`MessengerError::Unauthenticated`].
    async fn authenticate(&self, token: AuthToken) -> Result<AuthIdentity, MessengerError>;

    /// Returns `Ok(())` when `identity` may perform `action` on `resource`.
    fn authorize(
        &self,
        identity: &AuthIdentity,
        resource: &str,
        action: PermissionAction,
    ) -> Result<(), MessengerError>;
}
