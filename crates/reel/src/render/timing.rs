//! Duration planning
//!
//! Each image gets an equal share of the narration. Transitions start where the
//! un-overlapped part of the previous image ends (`k * per_image_duration`); the
//! overlap drift this ignores is absorbed by truncating the output to the audio.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPlan {
    pub image_count: usize,
    pub per_image_duration: f64,
    /// Zero when there is a single image
    pub transition_duration: f64,
    /// One offset per transition, in timeline seconds
    pub crossfade_offsets: Vec<f64>,
}

impl TimingPlan {
    /// Plan with the default 0.5s crossfade
    pub fn plan(image_count: usize, total_audio_duration: f64) -> Self {
        Self::with_transition(image_count, total_audio_duration, 0.5)
    }

    pub fn with_transition(image_count: usize, total_audio_duration: f64, transition: f64) -> Self {
        let count = image_count.max(1);
        let per_image_duration = total_audio_duration.max(0.0) / count as f64;
        let transition_duration = if count > 1 { transition.max(0.0) } else { 0.0 };
        let crossfade_offsets = (1..count)
            .map(|k| k as f64 * per_image_duration)
            .collect();

        Self {
            image_count: count,
            per_image_duration,
            transition_duration,
            crossfade_offsets,
        }
    }

    /// How long each still image is looped for at decode time
    pub fn input_duration(&self) -> f64 {
        self.per_image_duration + self.transition_duration
    }

    pub fn has_transitions(&self) -> bool {
        !self.crossfade_offsets.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.per_image_duration * self.image_count as f64
    }
}
