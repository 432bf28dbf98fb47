// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Tunables of the controllers, read from a `ControllerManagerConfiguration` document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// A duration written the way Kubernetes component configs write it (`1h30m`, `40s`, `500ms`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GoDuration(pub Duration);

impl GoDuration {
    pub const fn from_secs(secs: u64) -> Self {
        GoDuration(Duration::from_secs(secs))
    }
}

impl From<GoDuration> for Duration {
    fn from(d: GoDuration) -> Self {
        d.0
    }
}

/// Parse a duration such as `12h`, `1h30m`, `1.5s` or `250ms`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {:?}", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, input)),
        };
        total += value * factor;
        rest = &rest[unit_len..];
    }
    Ok(Duration::from_secs_f64(total))
}

/// Format a duration the way `parse_duration` reads it
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    let millis = d.subsec_millis();
    if secs == 0 && millis == 0 {
        return "0s".to_string();
    }
    if secs == 0 {
        return format!("{}ms", millis);
    }
    let mut out = String::new();
    let hours = secs / 3600;
    secs %= 3600;
    let minutes = secs / 60;
    secs %= 60;
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if secs > 0 || millis > 0 {
        if millis > 0 {
            out.push_str(&format!("{}.{:03}s", secs, millis));
        } else {
            out.push_str(&format!("{}s", secs));
        }
    }
    out
}

impl fmt::Display for GoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0))
    }
}

impl Serialize for GoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(self.0))
    }
}

impl<'de> Deserialize<'de> for GoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw)
            .map(GoDuration)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerManagerConfiguration {
    pub controllers: ControllersConfiguration,
    pub admission: AdmissionConfiguration,
}

impl ControllerManagerConfiguration {
    pub fn from_yaml(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllersConfiguration {
    pub project: ProjectControllerConfiguration,
    pub bastion: BastionControllerConfiguration,
    pub seed: SeedControllerConfiguration,
    pub shoot_care: ShootCareControllerConfiguration,
    pub shoot_maintenance: ShootMaintenanceControllerConfiguration,
    pub managed_seed_set: ManagedSeedSetControllerConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectControllerConfiguration {
    pub minimum_lifetime_days: i64,
    pub stale_grace_period_days: i64,
    pub stale_expiration_time_days: i64,
    pub stale_sync_period: GoDuration,
}

impl Default for ProjectControllerConfiguration {
    fn default() -> Self {
        Self {
            minimum_lifetime_days: 30,
            stale_grace_period_days: 14,
            stale_expiration_time_days: 90,
            stale_sync_period: GoDuration::from_secs(12 * 3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BastionControllerConfiguration {
    pub max_lifetime: GoDuration,
}

impl Default for BastionControllerConfiguration {
    fn default() -> Self {
        Self {
            max_lifetime: GoDuration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedControllerConfiguration {
    pub sync_period: GoDuration,
    /// Time after which a seed without heartbeat is considered unknown
    pub monitor_period: GoDuration,
    /// Time after which the shoots of such a seed are considered unknown
    pub shoot_monitor_period: GoDuration,
}

impl Default for SeedControllerConfiguration {
    fn default() -> Self {
        Self {
            sync_period: GoDuration::from_secs(30),
            monitor_period: GoDuration::from_secs(40),
            shoot_monitor_period: GoDuration::from_secs(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShootCareControllerConfiguration {
    pub sync_period: GoDuration,
    pub stale_extension_health_checks: StaleExtensionHealthChecks,
    pub condition_thresholds: Vec<ConditionThreshold>,
}

impl Default for ShootCareControllerConfiguration {
    fn default() -> Self {
        Self {
            sync_period: GoDuration::from_secs(60),
            stale_extension_health_checks: StaleExtensionHealthChecks::default(),
            condition_thresholds: vec![],
        }
    }
}

impl ShootCareControllerConfiguration {
    pub fn threshold_for(&self, condition_type: &str) -> Option<std::time::Duration> {
        self.condition_thresholds
            .iter()
            .find(|t| t.condition_type == condition_type)
            .map(|t| t.duration.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaleExtensionHealthChecks {
    pub enabled: bool,
    pub threshold: GoDuration,
}

impl Default for StaleExtensionHealthChecks {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: GoDuration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionThreshold {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub duration: GoDuration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShootMaintenanceControllerConfiguration {
    pub sync_period: GoDuration,
}

impl Default for ShootMaintenanceControllerConfiguration {
    fn default() -> Self {
        Self {
            sync_period: GoDuration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedSeedSetControllerConfiguration {
    pub sync_period: GoDuration,
    /// How often a failed replica is retried before the set gives up on it
    pub max_shoot_retries: i32,
}

impl Default for ManagedSeedSetControllerConfiguration {
    fn default() -> Self {
        Self {
            sync_period: GoDuration::from_secs(30 * 60),
            max_shoot_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionConfiguration {
    pub seed_restriction: SeedRestrictionConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedRestrictionConfiguration {
    pub enabled: bool,
}

impl Default for SeedRestrictionConfiguration {
    fn default() -> Self {
        Self { enabled: true }
    }
}
