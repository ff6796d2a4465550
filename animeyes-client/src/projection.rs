use animeyes_core::{EyePose, RuntimeState};

use crate::locks::LockState;

const MAX_VERTICAL_DIVERGENCE: f64 = 50.0;
const MAX_PUPIL_OFFSET: f64 = 15.0;

/// Values shown by the interactive controls, in slider units.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlValues {
    pub gaze_x: i32,
    pub gaze_y: i32,
    pub gaze_z: i32,
    pub lid_left: i32,
    pub lid_right: i32,
    /// Coupling slider position, -100..=100.
    pub coupling: i32,
    pub mode: String,
    pub preview: EyePreview,
}

impl Default for ControlValues {
    fn default() -> Self {
        Self {
            gaze_x: 0,
            gaze_y: 0,
            gaze_z: 100,
            lid_left: 0,
            lid_right: 0,
            coupling: 100,
            mode: String::new(),
            preview: EyePreview::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PupilOffset {
    pub x: f64,
    pub y: f64,
}

/// Geometry of the two-eye preview drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EyePreview {
    pub left_pupil: PupilOffset,
    pub right_pupil: PupilOffset,
    /// 0 = lid fully open, 1 = fully closed.
    pub left_lid_scale: f64,
    pub right_lid_scale: f64,
}

impl EyePreview {
    fn pupils(eye: &EyePose, mirror: bool) -> (PupilOffset, PupilOffset) {
        let vergence = eye.max_vergence * (100.0 - eye.gaze_z) / 200.0;
        let mut left_x = eye.gaze_x + vergence * eye.coupling;
        let mut right_x = eye.gaze_x - vergence * eye.coupling;
        if mirror {
            left_x = -left_x;
            right_x = -right_x;
        }

        let divergence = if eye.coupling < 0.0 {
            MAX_VERTICAL_DIVERGENCE * -eye.coupling
        } else {
            0.0
        };
        let left_y = (eye.gaze_y + divergence).clamp(-100.0, 100.0);
        let right_y = (eye.gaze_y - divergence).clamp(-100.0, 100.0);

        let offset = |x: f64, y: f64| PupilOffset {
            x: x / 100.0 * MAX_PUPIL_OFFSET,
            y: -(y / 100.0) * MAX_PUPIL_OFFSET,
        };
        (offset(left_x, left_y), offset(right_x, right_y))
    }
}

pub fn lid_scale(lid: f64) -> f64 {
    ((100.0 - lid) / 200.0).clamp(0.0, 1.0)
}

fn slider(value: f64) -> i32 {
    value.round() as i32
}

/// Projects the latest broadcast into control values.
///
/// Each group is either taken whole from `state` or kept whole from
/// `previous`; nothing is applied half-way. Pupils in the preview always
/// follow the broadcast, preview lids hold still during a blink animation.
pub fn project(
    state: &RuntimeState,
    locks: &LockState,
    previous: &ControlValues,
    mirror_preview: bool,
) -> ControlValues {
    let eye = &state.eye;
    let mut next = previous.clone();

    if !locks.gaze_pad_active && !locks.controls_locked {
        next.gaze_x = slider(eye.gaze_x);
        next.gaze_y = slider(eye.gaze_y);
    }
    if !locks.controls_locked {
        next.gaze_z = slider(eye.gaze_z);
        next.coupling = slider(eye.coupling * 100.0);
    }
    if !locks.lid_sliders_active && !locks.controls_locked {
        next.lid_left = slider(eye.lid_left);
        next.lid_right = slider(eye.lid_right);
    }
    if !locks.mode_selector_locked && !state.mode.current.is_empty() {
        next.mode = state.mode.current.clone();
    }

    let (left_pupil, right_pupil) = EyePreview::pupils(eye, mirror_preview || eye.mirror_preview);
    next.preview.left_pupil = left_pupil;
    next.preview.right_pupil = right_pupil;
    if !locks.blink_animating {
        next.preview.left_lid_scale = lid_scale(eye.lid_left);
        next.preview.right_lid_scale = lid_scale(eye.lid_right);
    }

    next
}
