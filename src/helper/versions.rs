// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Version parsing and selection of update targets from a cloud profile.

use crate::types::cloudprofile::ExpirableVersion;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted `major.minor.patch` version with an optional pre-release suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (trimmed, None),
        };
        let mut parts = core.split('.');
        let mut next = |name: &str| -> Result<u64, String> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p
                    .parse::<u64>()
                    .map_err(|e| format!("invalid {} in version {:?}: {}", name, s, e)),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        if parts.next().is_some() {
            return Err(format!("too many components in version {:?}", s));
        }
        Ok(Version {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Versions that are neither expired nor in preview, parsed
fn candidates<'a>(
    versions: &'a [ExpirableVersion],
    now: DateTime<Utc>,
) -> impl Iterator<Item = (Version, &'a ExpirableVersion)> + 'a {
    versions
        .iter()
        .filter(move |v| !v.is_expired(now) && !v.is_preview())
        .filter_map(|v| v.version.parse::<Version>().ok().map(|p| (p, v)))
}

/// Highest patch version of the same minor that is newer than `current`
pub fn highest_patch_same_minor(
    versions: &[ExpirableVersion],
    current: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let current: Version = current.parse().ok()?;
    candidates(versions, now)
        .filter(|(v, _)| v.major == current.major && v.minor == current.minor && *v > current)
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v.version.clone())
}

/// Highest patch version of the next minor
pub fn highest_patch_next_minor(
    versions: &[ExpirableVersion],
    current: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let current: Version = current.parse().ok()?;
    candidates(versions, now)
        .filter(|(v, _)| v.major == current.major && v.minor == current.minor + 1)
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v.version.clone())
}

/// Highest version overall that is newer than `current`
pub fn highest_version(
    versions: &[ExpirableVersion],
    current: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let current: Version = current.parse().ok()?;
    candidates(versions, now)
        .filter(|(v, _)| *v > current)
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v.version.clone())
}

pub fn find_version<'a>(versions: &'a [ExpirableVersion], version: &str) -> Option<&'a ExpirableVersion> {
    versions.iter().find(|v| v.version == version)
}

/// Kubernetes version a shoot should move to during maintenance, if any.
///
/// With auto update the shoot follows the highest patch of its minor. An
/// expired version forces the same move, or the move to the next minor when
/// the shoot already runs the highest patch.
pub fn kubernetes_update_target(
    versions: &[ExpirableVersion],
    current: &str,
    auto_update: bool,
    now: DateTime<Utc>,
) -> Option<String> {
    let expired = find_version(versions, current).is_some_and(|v| v.is_expired(now));
    if !auto_update && !expired {
        return None;
    }
    match highest_patch_same_minor(versions, current, now) {
        Some(v) => Some(v),
        None if expired => highest_patch_next_minor(versions, current, now),
        None => None,
    }
}

/// Machine image version a worker pool should move to during maintenance, if any
pub fn machine_image_update_target(
    versions: &[ExpirableVersion],
    current: &str,
    auto_update: bool,
    now: DateTime<Utc>,
) -> Option<String> {
    let expired = find_version(versions, current).is_some_and(|v| v.is_expired(now));
    if !auto_update && !expired {
        return None;
    }
    highest_version(versions, current, now)
}
