// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::annotations;
use crate::error::{GardenerError, Result};
use std::collections::BTreeMap;

/// Prefix of the ingress subdomain of a shoot
pub const INGRESS_PREFIX: &str = "ingress";
/// Prefix of the internal domain of a shoot
pub const INTERNAL_DOMAIN_KEY: &str = "internal";

/// DNS settings read from a default or internal domain secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub provider: String,
    pub domain: String,
    pub include_zones: Vec<String>,
    pub exclude_zones: Vec<String>,
}

pub fn get_domain_info_from_annotations(
    annotations: Option<&BTreeMap<String, String>>,
) -> Result<DomainInfo> {
    let Some(annotations) = annotations else {
        return Err(GardenerError::DomainInfo(
            "domain secret has no annotations".to_string(),
        ));
    };

    let Some(domain) = annotations.get(annotations::DNS_DOMAIN) else {
        return Err(GardenerError::DomainInfo(
            "missing dns domain annotation on domain secret".to_string(),
        ));
    };
    let Some(provider) = annotations.get(annotations::DNS_PROVIDER) else {
        return Err(GardenerError::DomainInfo(
            "missing dns provider annotation on domain secret".to_string(),
        ));
    };

    Ok(DomainInfo {
        provider: provider.clone(),
        domain: domain.clone(),
        include_zones: split_zones(annotations.get(annotations::DNS_INCLUDE_ZONES)),
        exclude_zones: split_zones(annotations.get(annotations::DNS_EXCLUDE_ZONES)),
    })
}

fn split_zones(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn get_api_server_domain(domain: &str) -> String {
    format!("api.{}", domain)
}
