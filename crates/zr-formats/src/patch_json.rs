//! Patch import and export as JSON.
//!
//! Import is all-or-nothing: a syntax error, a missing required field or a
//! newer schema version rejects the whole document. Optional fields take
//! their defaults and every numeric value is clamped into range.

use thiserror::Error;
use zr_ir::division::{BPM_MAX, BPM_MIN, DEFAULT_BPM};
use zr_ir::{finite_or, Patch, PATCH_VERSION, VOLUME_MAX};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid patch JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("patch version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Parse a patch document.
pub fn import_patch(json: &str) -> Result<Patch, PatchError> {
    let mut patch: Patch = serde_json::from_str(json)?;
    if patch.version > PATCH_VERSION {
        return Err(PatchError::UnsupportedVersion { found: patch.version, supported: PATCH_VERSION });
    }
    patch.normalize();
    sanitize(&mut patch);
    log::debug!("patch: imported v{} at {} bpm", patch.version, patch.bpm);
    Ok(patch)
}

/// Serialize the live snapshot verbatim.
pub fn export_patch(patch: &Patch) -> Result<String, PatchError> {
    Ok(serde_json::to_string_pretty(patch)?)
}

fn sanitize(patch: &mut Patch) {
    let defaults = Patch::default();
    patch.version = PATCH_VERSION;
    patch.bpm = finite_or(patch.bpm, DEFAULT_BPM).clamp(BPM_MIN, BPM_MAX);
    for (lane, fallback) in patch.drum_settings.iter_mut().zip(&defaults.drum_settings) {
        *lane = lane.clamped(fallback);
    }
    patch.drum_effects = patch.drum_effects.clamped(&defaults.drum_effects);
    patch.pad_params = patch.pad_params.clamped(&defaults.pad_params);
    patch.env_params = patch.env_params.clamped(&defaults.env_params);
    for (generator, fallback) in patch.gen_params.iter_mut().zip(&defaults.gen_params) {
        *generator = generator.clamped(fallback);
    }
    for (sends, fallback) in patch.gen_effects.iter_mut().zip(&defaults.gen_effects) {
        *sends = sends.clamped(fallback);
    }
    for volume in &mut patch.mixer_volumes {
        *volume = finite_or(*volume, 1.0).clamp(0.0, VOLUME_MAX);
    }
    for pan in &mut patch.mixer_panning {
        *pan = finite_or(*pan, 0.0).clamp(-1.0, 1.0);
    }
    patch.master_volume = finite_or(patch.master_volume, defaults.master_volume).clamp(0.0, VOLUME_MAX);
    patch.master_reverb = finite_or(patch.master_reverb, defaults.master_reverb).clamp(0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_is_identity() {
        let mut patch = Patch::default();
        patch.bpm = 96.0;
        patch.mixer_mute[2] = true;
        patch.gen_params[1].active = true;
        let json = export_patch(&patch).unwrap();
        assert_eq!(import_patch(&json).unwrap(), patch);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(import_patch("{ bpm: 80"), Err(PatchError::Json(_))));
    }

    #[test]
    fn rejects_missing_required_field() {
        let mut value = serde_json::to_value(Patch::default()).unwrap();
        value.as_object_mut().unwrap().remove("drumSeq");
        assert!(import_patch(&value.to_string()).is_err());
    }

    #[test]
    fn rejects_newer_version() {
        let mut value = serde_json::to_value(Patch::default()).unwrap();
        value["version"] = serde_json::json!(PATCH_VERSION + 1);
        assert!(matches!(
            import_patch(&value.to_string()),
            Err(PatchError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn optional_fields_default() {
        let mut value = serde_json::to_value(Patch::default()).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("chordRange");
        obj.remove("chordIsTriplet");
        obj.remove("version");
        let patch = import_patch(&value.to_string()).unwrap();
        assert_eq!(patch.chord_range, 2);
        assert!(!patch.chord_is_triplet);
        assert_eq!(patch.version, PATCH_VERSION);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut value = serde_json::to_value(Patch::default()).unwrap();
        value["bpm"] = serde_json::json!(500.0);
        value["masterVolume"] = serde_json::json!(7.0);
        value["mixerPanning"] = serde_json::json!([-3.0, 0.0, 0.0, 0.0, 0.0, 2.0]);
        let patch = import_patch(&value.to_string()).unwrap();
        assert_eq!(patch.bpm, BPM_MAX);
        assert_eq!(patch.master_volume, VOLUME_MAX);
        assert_eq!(patch.mixer_panning[0], -1.0);
        assert_eq!(patch.mixer_panning[5], 1.0);
    }
}
