// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod automations;
pub mod campaigns;
pub mod conversations;
pub mod ledger;
pub mod messages;
pub mod orders;
pub mod tenants;
