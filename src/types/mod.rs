// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types of the Gardener API groups.

pub mod backup;
pub mod bastion;
pub mod cloudprofile;
pub mod common;
pub mod managedresource;
pub mod managedseed;
pub mod project;
pub mod secretbinding;
pub mod seed;
pub mod shoot;
pub mod worker;
