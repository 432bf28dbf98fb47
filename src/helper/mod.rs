// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by controllers, admission and botanist code.

pub mod conditions;
pub mod dns;
pub mod errors;
pub mod versions;
