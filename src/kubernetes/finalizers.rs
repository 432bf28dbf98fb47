// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finalizer, annotation and status patches shared by the controllers.
//!
//! Finalizer changes are JSON patches guarded by a `test` operation, so a
//! concurrent writer makes the patch fail instead of being overwritten.

use crate::constants::annotations;
use crate::error::Result;
use kube::{
    api::{Patch, PatchParams},
    Api, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt::Debug;
use tracing::debug;

pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

pub fn add_finalizer_patch(current: &[String], finalizer: &str) -> Value {
    if current.is_empty() {
        json!([
            {"op": "test", "path": "/metadata/finalizers", "value": null},
            {"op": "add", "path": "/metadata/finalizers", "value": [finalizer]}
        ])
    } else {
        json!([
            {"op": "test", "path": "/metadata/finalizers", "value": current},
            {"op": "add", "path": "/metadata/finalizers/-", "value": finalizer}
        ])
    }
}

pub fn remove_finalizer_patch(current: &[String], finalizer: &str) -> Option<Value> {
    let index = current.iter().position(|f| f == finalizer)?;
    let path = format!("/metadata/finalizers/{}", index);
    Some(json!([
        {"op": "test", "path": path, "value": finalizer},
        {"op": "remove", "path": path}
    ]))
}

pub async fn ensure_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    if has_finalizer(obj, finalizer) {
        return Ok(());
    }
    debug!("Adding finalizer {} to {}", finalizer, obj.name_any());
    let patch = add_finalizer_patch(obj.finalizers(), finalizer);
    api.patch(
        &obj.name_any(),
        &PatchParams::default(),
        &Patch::Json::<()>(serde_json::from_value(patch)?),
    )
    .await?;
    Ok(())
}

pub async fn remove_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let Some(patch) = remove_finalizer_patch(obj.finalizers(), finalizer) else {
        return Ok(());
    };
    debug!("Removing finalizer {} from {}", finalizer, obj.name_any());
    match api
        .patch(
            &obj.name_any(),
            &PatchParams::default(),
            &Patch::Json::<()>(serde_json::from_value(patch)?),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Set the annotation that allows the object to be deleted
pub async fn confirm_deletion<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let key = annotations::CONFIRMATION_DELETION;
    let patch = json!({"metadata": {"annotations": {key: "true"}}});
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Merge an annotation change; `None` removes the annotation
pub async fn patch_annotation<K>(api: &Api<K>, name: &str, key: &str, value: Option<&str>) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let patch = json!({"metadata": {"annotations": {key: value}}});
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Merge patch on the status subresource
pub async fn patch_status<K>(api: &Api<K>, name: &str, status: Value) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let patch = json!({ "status": status });
    Ok(api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}
