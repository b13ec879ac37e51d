// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod check;
mod convert;
mod query;

pub use check::CheckCmd;
pub use convert::ConvertCmd;
pub use query::QueryCmd;
