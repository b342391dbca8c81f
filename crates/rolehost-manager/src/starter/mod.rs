// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Starter module - instance boot backends.

pub mod mock;
pub mod process;
mod traits;

pub use mock::MockStarter;
pub use process::{ProcessStarter, RoleCommand};
pub use traits::*;
