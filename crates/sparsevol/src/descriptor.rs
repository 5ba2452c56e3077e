//! Serializable identity of a volume source.
//!
//! A descriptor carries only what is needed to rebind a source in another
//! process: the file, the field, and the step size override. Key names follow
//! the host property names `filename`, `fieldname` and `customStepSize`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sparsevol_core::{GridPool, Result};

use crate::volume_source::VolumeSource;

/// The (source, field, step override) triple identifying a [`VolumeSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSourceDescriptor {
    /// Source identifier (file path).
    pub filename: String,
    /// Field within the source.
    pub fieldname: String,
    /// Step size override; ignored unless positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_step_size: Option<f32>,
}

impl VolumeSourceDescriptor {
    pub fn new(filename: impl Into<String>, fieldname: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            fieldname: fieldname.into(),
            custom_step_size: None,
        }
    }

    /// Sets the step size override.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f32) -> Self {
        self.custom_step_size = Some(step_size);
        self
    }

    /// Parses a descriptor from host configuration JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Binds the described source against `pool`.
    pub fn open(&self, pool: &Arc<GridPool>) -> Result<VolumeSource> {
        VolumeSource::from_descriptor(pool, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_properties() {
        let desc = VolumeSourceDescriptor::from_json(
            r#"{ "filename": "fire.svol.json", "fieldname": "temperature", "customStepSize": 0.01 }"#,
        )
        .unwrap();
        assert_eq!(desc.filename, "fire.svol.json");
        assert_eq!(desc.fieldname, "temperature");
        assert_eq!(desc.custom_step_size, Some(0.01));
    }

    #[test]
    fn test_step_size_is_optional() {
        let desc =
            VolumeSourceDescriptor::from_json(r#"{ "filename": "a", "fieldname": "b" }"#).unwrap();
        assert_eq!(desc, VolumeSourceDescriptor::new("a", "b"));
        assert!(!desc.to_json().unwrap().contains("customStepSize"));
    }

    #[test]
    fn test_missing_fieldname_is_error() {
        assert!(VolumeSourceDescriptor::from_json(r#"{ "filename": "a" }"#).is_err());
    }

    #[test]
    fn test_json_keeps_property_names() {
        let json = VolumeSourceDescriptor::new("smoke.svol.json", "density")
            .with_step_size(2.0)
            .to_json()
            .unwrap();
        assert!(json.contains("\"filename\""));
        assert!(json.contains("\"fieldname\""));
        assert!(json.contains("\"customStepSize\""));
    }
}
