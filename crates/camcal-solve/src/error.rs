/// Reasons the solver cannot produce stable parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("need at least {need} views, got {got}")]
    NotEnoughViews { need: usize, got: usize },
    #[error("homography estimation failed for view {view}")]
    HomographyFailed { view: usize },
    #[error("degenerate view configuration: {0}")]
    Degenerate(&'static str),
    #[error("image size {width}x{height} is empty")]
    EmptyImage { width: u32, height: u32 },
    #[error("refinement diverged: {0}")]
    Diverged(String),
}
