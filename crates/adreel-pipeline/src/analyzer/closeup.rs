//! Face close-up detection by majority vote.

use adreel_media::{estimate_face_area_ratio, pick_evenly};
use std::path::PathBuf;
use tracing::debug;

use super::vocabulary::mentions_face;

/// Individual close-up votes. `None` means the check could not run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CloseupVotes {
    pub tag_vocabulary: bool,
    pub face_area: Option<bool>,
    pub manifest_flag: Option<bool>,
}

impl CloseupVotes {
    fn available(&self) -> (usize, usize) {
        let votes = [Some(self.tag_vocabulary), self.face_area, self.manifest_flag];
        let cast: Vec<bool> = votes.into_iter().flatten().collect();
        (cast.iter().filter(|v| **v).count(), cast.len())
    }

    /// Strict majority of the checks that ran. Tag text alone never decides.
    pub fn is_closeup(&self) -> bool {
        let (yes, total) = self.available();
        total >= 2 && yes * 2 > total
    }
}

pub fn tag_vote(tag_text: &str) -> bool {
    mentions_face(tag_text)
}

/// Mean face-area ratio over up to `samples` frames. Unreadable frames are skipped.
pub async fn mean_face_area(frames: &[PathBuf], samples: usize) -> Option<f64> {
    let picked = pick_evenly(frames, samples);
    let mut ratios = Vec::with_capacity(picked.len());
    for frame in &picked {
        match estimate_face_area_ratio(frame).await {
            Ok(ratio) => ratios.push(ratio),
            Err(e) => debug!(frame = %frame.display(), error = %e, "Face estimate skipped"),
        }
    }
    if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }
}
