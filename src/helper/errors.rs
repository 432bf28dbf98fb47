// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Classification of provider error messages into Gardener error codes.

use crate::error::{ErrorWithCodes, GardenerError};
use crate::types::common::{ErrorCode, LastError};
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const UNAUTHORIZED: &str = r"(?i)(Unauthorized|InvalidClientTokenId|InvalidAuthenticationTokenTenant|SignatureDoesNotMatch|Authentication failed|AuthFailure|AuthorizationFailed|invalid character|invalid_grant|invalid_client|Authorization Profile was not found|cannot fetch token|no active subscriptions|InvalidAccessKeyId|InvalidSecretAccessKey|query returned no results|UnauthorizedOperation|not authorized|InvalidSubscriptionId)";
const QUOTA_EXCEEDED: &str = r"(?i)(LimitExceeded|Quotas)";
const RATE_LIMITS_EXCEEDED: &str = r"(?i)(Throttling|Too many requests)";
const INSUFFICIENT_PRIVILEGES: &str = r"(?i)(AccessDenied|OperationNotAllowed|Error 403)";
const DEPENDENCIES: &str = r"(?i)(PendingVerification|Access Not Configured|accessNotConfigured|DependencyViolation|OptInRequired|DeleteConflict|Conflict|inactive billing state|ReadOnlyDisabledSubscription|is already being used|InUseSubnetCannotBeDeleted|VnetInUse|InUseRouteTableCannotBeDeleted|timeout while waiting for state to become|InvalidCidrBlock|already busy for|InsufficientFreeAddressesInSubnet|InternalServerError|Future#WaitForCompletion: context has been cancelled|internalerror|internal server error|A resource with the ID|VnetAddressSpaceCannotChangeDueToPeerings|InternalBillingError)";
const RETRYABLE_DEPENDENCIES: &str = r"(?i)(RetryableError)";
const RESOURCES_DEPLETED: &str = r"(?i)(not available in the current hardware cluster|InsufficientInstanceCapacity|SkuNotAvailable|ZonalAllocationFailed|out of stock)";
const CONFIGURATION_PROBLEM: &str = r"(?i)(AzureBastionSubnet|not supported in your requested Availability Zone|InvalidParameter|InvalidParameterValue|notFound|NetcfgInvalidSubnet|InvalidSubnet|Invalid value|KubeletHasInsufficientMemory|KubeletHasDiskPressure|KubeletHasInsufficientPID|violates constraint|no attached internet gateway found|Your query returned no results|PrivateEndpointNetworkPoliciesCannotBeEnabledOnPrivateEndpointSubnet|invalid VPC attributes|PrivateLinkServiceNetworkPoliciesCannotBeEnabledOnPrivateLinkServiceSubnet|unrecognized feature gate|runtime-config invalid key|LoadBalancingRuleMustDisableSNATSinceSameFrontendIPConfigurationIsReferencedByOutboundRule|strict decoder error|not allowed to configure an unsupported)";
const RETRYABLE_CONFIGURATION_PROBLEM: &str = r"(?i)(is misconfigured and requires zero voluntary evictions)";

fn code_patterns() -> &'static [(ErrorCode, Regex)] {
    static PATTERNS: OnceLock<Vec<(ErrorCode, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ErrorCode::InfraUnauthorized, UNAUTHORIZED),
            (ErrorCode::InfraQuotaExceeded, QUOTA_EXCEEDED),
            (ErrorCode::InfraRateLimitsExceeded, RATE_LIMITS_EXCEEDED),
            (ErrorCode::InfraInsufficientPrivileges, INSUFFICIENT_PRIVILEGES),
            (ErrorCode::InfraDependencies, DEPENDENCIES),
            (ErrorCode::RetryableInfraDependencies, RETRYABLE_DEPENDENCIES),
            (ErrorCode::InfraResourcesDepleted, RESOURCES_DEPLETED),
            (ErrorCode::ConfigurationProblem, CONFIGURATION_PROBLEM),
            (
                ErrorCode::RetryableConfigurationProblem,
                RETRYABLE_CONFIGURATION_PROBLEM,
            ),
        ]
        .into_iter()
        .filter_map(|(code, pattern)| Regex::new(pattern).ok().map(|re| (code, re)))
        .collect()
    })
}

/// Determine the error codes for a message.
///
/// Codes already known for the error are kept. Their patterns are not matched
/// again. The result is sorted and free of duplicates.
pub fn determine_error_codes(message: &str, known: &[ErrorCode]) -> Vec<ErrorCode> {
    let mut codes: BTreeSet<ErrorCode> = known.iter().copied().collect();
    for (code, re) in code_patterns() {
        if known.contains(code) {
            continue;
        }
        if re.is_match(message) {
            codes.insert(*code);
        }
    }
    codes.into_iter().collect()
}

/// Wrap an error into an [`ErrorWithCodes`], using `message` as description when it is set
pub fn determine_error(err: &GardenerError, message: &str) -> ErrorWithCodes {
    let text = err.to_string();
    let description = if message.is_empty() { text.as_str() } else { message };
    ErrorWithCodes::new(description, determine_error_codes(&text, err.codes()))
}

/// Upper-case the first character of an error description
pub fn format_last_err_description(description: &str) -> String {
    let mut chars = description.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A [`LastError`] stamped with the current time
pub fn last_error(description: impl Into<String>, codes: Vec<ErrorCode>) -> LastError {
    LastError {
        description: description.into(),
        task_id: None,
        codes,
        last_update_time: Some(Utc::now()),
    }
}

/// Like [`last_error`], for an error that belongs to a single task of a flow
pub fn last_error_with_task_id(
    description: impl Into<String>,
    task_id: impl Into<String>,
    codes: Vec<ErrorCode>,
) -> LastError {
    LastError {
        task_id: Some(task_id.into()),
        ..last_error(description, codes)
    }
}

/// Errors with one of these codes will not go away by retrying
pub fn has_non_retryable_error_code(last_errors: &[LastError]) -> bool {
    last_errors.iter().flat_map(|e| e.codes.iter()).any(|code| {
        matches!(
            code,
            ErrorCode::InfraUnauthorized
                | ErrorCode::InfraInsufficientPrivileges
                | ErrorCode::InfraDependencies
                | ErrorCode::InfraQuotaExceeded
                | ErrorCode::InfraRateLimitsExceeded
                | ErrorCode::ConfigurationProblem
        )
    })
}

/// Whether any of the errors carries `code`
pub fn has_error_code(last_errors: &[LastError], code: ErrorCode) -> bool {
    last_errors.iter().any(|e| e.codes.contains(&code))
}
