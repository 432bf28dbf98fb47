// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// What the seed's fluent-bit needs to parse kube-apiserver logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralLoggingConfiguration {
    pub parsers: String,
    pub filters: String,
    pub pod_prefix: String,
    pub user_exposed: bool,
}

const POD_PREFIX: &str = "kube-apiserver";

const PARSERS: &str = "[PARSER]\n\
    \tName        kubeapiserverParser\n\
    \tFormat      regex\n\
    \tRegex       ^(?<severity>\\w)(?<time>\\d{4} [^\\s]*)\\s+(?<pid>\\d+)\\s+(?<source>[^ \\]]+)\\] (?<log>.*)$\n\
    \tTime_Key    time\n\
    \tTime_Format %m%d %H:%M:%S.%L\n";

const FILTERS: &str = "[FILTER]\n\
    \tName                parser\n\
    \tMatch               kubernetes.*kube-apiserver*kube-apiserver*\n\
    \tKey_Name            log\n\
    \tParser              kubeapiserverParser\n\
    \tReserve_Data        True\n";

pub fn central_logging_configuration() -> CentralLoggingConfiguration {
    CentralLoggingConfiguration {
        parsers: PARSERS.to_string(),
        filters: FILTERS.to_string(),
        pod_prefix: POD_PREFIX.to_string(),
        user_exposed: true,
    }
}
