// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Condition and last operation bookkeeping.

use crate::constants::{annotations, operation};
use crate::types::common::{
    Condition, ConditionStatus, LastOperation, LastOperationState, LastOperationType,
};
use chrono::{DateTime, Utc};
use kube::api::ObjectMeta;

pub const REASON_CONDITION_INITIALIZED: &str = "ConditionInitialized";
pub const REASON_CONDITION_NOT_CHECKED: &str = "ConditionNotChecked";

pub fn get_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// A fresh condition in state Unknown
pub fn init_condition(condition_type: &str) -> Condition {
    let now = Utc::now();
    Condition {
        condition_type: condition_type.to_string(),
        status: ConditionStatus::Unknown,
        last_transition_time: Some(now),
        last_update_time: Some(now),
        reason: REASON_CONDITION_INITIALIZED.to_string(),
        message: "The condition has been initialized but its semantic check has not been performed yet.".to_string(),
        codes: vec![],
    }
}

/// Return the existing condition of that type or an initialized one
pub fn get_or_init_condition(conditions: &[Condition], condition_type: &str) -> Condition {
    get_condition(conditions, condition_type)
        .cloned()
        .unwrap_or_else(|| init_condition(condition_type))
}

pub fn updated_condition(
    condition: &Condition,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> Condition {
    updated_condition_at(condition, status, reason, message, Utc::now())
}

pub fn updated_condition_at(
    condition: &Condition,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Condition {
    let mut updated = condition.clone();
    if condition.status != status {
        updated.last_transition_time = Some(now);
    }
    updated.status = status;
    updated.reason = reason.to_string();
    updated.message = message.to_string();
    updated.last_update_time = Some(now);
    updated.codes.clear();
    updated
}

pub fn updated_condition_unknown_error_message(condition: &Condition, message: &str) -> Condition {
    updated_condition(condition, ConditionStatus::Unknown, "ConditionCheckError", message)
}

/// Replace conditions by type and append the ones not present yet
pub fn merge_conditions(existing: &[Condition], new: &[Condition]) -> Vec<Condition> {
    let mut result = existing.to_vec();
    for condition in new {
        match result
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(slot) => *slot = condition.clone(),
            None => result.push(condition.clone()),
        }
    }
    result
}

/// Both lists carry the same conditions apart from their timestamps
pub fn conditions_equal_ignoring_timestamps(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.condition_type == y.condition_type
                && x.status == y.status
                && x.reason == y.reason
                && x.message == y.message
                && x.codes == y.codes
        })
}

/// Determine the operation type an extension controller is about to perform
pub fn compute_operation_type(
    meta: &ObjectMeta,
    last_operation: Option<&LastOperation>,
) -> LastOperationType {
    let requested = meta
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::GARDENER_OPERATION));
    if requested.is_some_and(|op| op == operation::MIGRATE) {
        return LastOperationType::Migrate;
    }
    if meta.deletion_timestamp.is_some() {
        return LastOperationType::Delete;
    }
    let Some(last) = last_operation else {
        return LastOperationType::Create;
    };
    match (last.operation_type, last.state) {
        (LastOperationType::Create, state) if state != LastOperationState::Succeeded => {
            LastOperationType::Create
        }
        (LastOperationType::Migrate, state) if state != LastOperationState::Succeeded => {
            LastOperationType::Migrate
        }
        (LastOperationType::Restore, state) if state != LastOperationState::Succeeded => {
            LastOperationType::Restore
        }
        _ => LastOperationType::Reconcile,
    }
}
