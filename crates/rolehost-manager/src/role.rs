// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster roles and role token resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The kind of service an instance plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Cluster coordinator.
    Controller,
    /// Query router.
    Broker,
    /// Data-serving node.
    Server,
}

impl Role {
    /// All known roles.
    pub const ALL: [Role; 3] = [Role::Controller, Role::Broker, Role::Server];

    /// Canonical name, used in derived directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Controller => "Controller",
            Role::Broker => "Broker",
            Role::Server => "Server",
        }
    }

    /// Resolve a role token.
    ///
    /// Matching is case-insensitive and exact: `"server"`, `"SERVER"` and
    /// `"Server"` all resolve, `"serv"` and `""` do not.
    pub fn resolve(token: &str) -> Result<Role> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| Error::UnrecognizedRole(token.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::resolve(s)
    }
}
