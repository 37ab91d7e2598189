use std::fmt;

use camcal_core::{CalibrationResult, Real};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Recalibrate,
}

impl Verdict {
    /// RMS strictly below `threshold` passes.
    pub fn from_rms(rms: Real, threshold: Real) -> Self {
        if rms < threshold {
            Verdict::Pass
        } else {
            Verdict::Recalibrate
        }
    }
}

/// Solved parameters plus the quality verdict, ready for transcription into a
/// camera config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub result: CalibrationResult,
    pub verdict: Verdict,
    pub threshold: Real,
}

impl CalibrationReport {
    pub fn new(result: CalibrationResult, threshold: Real) -> Self {
        let verdict = Verdict::from_rms(result.rms, threshold);
        Self {
            result,
            verdict,
            threshold,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

const RULE: &str = "==========================================";

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = &self.result.intrinsics;
        let d = &self.result.distortion;

        writeln!(f, "{RULE}")?;
        writeln!(f, "       CALIBRATION RESULT ({})", self.result.image_size)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Camera parameters:")?;
        writeln!(f, "  fx: {:.5}", k.fx)?;
        writeln!(f, "  fy: {:.5}", k.fy)?;
        writeln!(f, "  cx: {:.5}", k.cx)?;
        writeln!(f, "  cy: {:.5}", k.cy)?;
        writeln!(f)?;
        writeln!(f, "  k1: {:.5}", d.k1)?;
        writeln!(f, "  k2: {:.5}", d.k2)?;
        writeln!(f, "  p1: {:.5}", d.p1)?;
        writeln!(f, "  p2: {:.5}", d.p2)?;
        writeln!(f, "  k3: {:.5}", d.k3)?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "Calibration error (RMS): {:.4} pixels over {} views",
            self.result.rms,
            self.result.poses.len()
        )?;
        match self.verdict {
            Verdict::Pass => write!(f, "PASS: good result (RMS < {:.1})", self.threshold),
            Verdict::Recalibrate => write!(
                f,
                "RECALIBRATE: RMS >= {:.1}; retry with better lighting and more varied board poses",
                self.threshold
            ),
        }
    }
}
