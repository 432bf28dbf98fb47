// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission and authorization webhooks that restrict what gardenlets may do
//! on behalf of their seed.

pub mod authorizer;
pub mod graph;
pub mod seedrestriction;
pub mod server;

use crate::constants::seed_identity;

pub use authorizer::SeedAuthorizer;
pub use graph::Graph;
pub use seedrestriction::SeedRestriction;
pub use server::WebhookServer;

/// The seed a request was made for, derived from the requesting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedIdentity {
    pub name: String,
    /// The gardenlet is responsible for more than one seed
    pub ambiguous: bool,
}

impl SeedIdentity {
    /// Returns `None` for users that are not gardenlets
    pub fn from_user(username: &str, groups: &[String]) -> Option<Self> {
        if !groups.iter().any(|g| g == seed_identity::GROUP) {
            return None;
        }
        let name = username.strip_prefix(seed_identity::USER_NAME_PREFIX)?;
        Some(Self {
            name: name.to_string(),
            ambiguous: name == seed_identity::AMBIGUOUS_SUFFIX,
        })
    }

    pub fn owns(&self, seed_name: Option<&str>) -> bool {
        self.ambiguous || seed_name == Some(self.name.as_str())
    }
}
