use std::sync::Arc;
use std::time::Duration;

use crate::{Pt2, Pt3, ReferencePattern};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("observation has {observed} corners but the pattern has {expected}")]
    LengthMismatch { expected: usize, observed: usize },
    #[error("sample set is empty")]
    Empty,
    #[error("sample {index} refers to a different reference pattern")]
    MixedPatterns { index: usize },
}

/// One frame's detected checkerboard.
///
/// Corners follow the row-major ordering of [`ReferencePattern`].
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub corners: Vec<Pt2>,
    /// Set by the detector when the full grid was found.
    pub confident: bool,
}

impl Observation {
    pub fn new(corners: Vec<Pt2>) -> Self {
        Self {
            corners,
            confident: true,
        }
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }
}

/// An accepted (reference, observed) correspondence set.
#[derive(Clone, Debug)]
pub struct CalibrationSample {
    reference: Arc<ReferencePattern>,
    observed: Vec<Pt2>,
    captured_at: Duration,
}

impl CalibrationSample {
    pub fn new(
        reference: Arc<ReferencePattern>,
        observation: Observation,
        captured_at: Duration,
    ) -> Result<Self, SampleError> {
        if observation.len() != reference.len() {
            return Err(SampleError::LengthMismatch {
                expected: reference.len(),
                observed: observation.len(),
            });
        }
        Ok(Self {
            reference,
            observed: observation.corners,
            captured_at,
        })
    }

    pub fn reference(&self) -> &ReferencePattern {
        &self.reference
    }

    pub fn object_points(&self) -> &[Pt3] {
        self.reference.points()
    }

    pub fn image_points(&self) -> &[Pt2] {
        &self.observed
    }

    /// Stream time at which the frame was captured.
    pub fn captured_at(&self) -> Duration {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}

/// Non-empty, ordered collection of samples sharing one reference pattern.
#[derive(Clone, Debug)]
pub struct SampleSet {
    samples: Vec<CalibrationSample>,
}

impl SampleSet {
    pub fn new(samples: Vec<CalibrationSample>) -> Result<Self, SampleError> {
        let first = samples.first().ok_or(SampleError::Empty)?;
        let pattern = first.reference.clone();
        for (index, s) in samples.iter().enumerate().skip(1) {
            if !Arc::ptr_eq(&s.reference, &pattern) && *s.reference != *pattern {
                return Err(SampleError::MixedPatterns { index });
            }
        }
        Ok(Self { samples })
    }

    pub fn pattern(&self) -> &ReferencePattern {
        // Non-empty by construction.
        self.samples[0].reference()
    }

    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CalibrationSample> {
        self.samples.iter()
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a CalibrationSample;
    type IntoIter = std::slice::Iter<'a, CalibrationSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
