//! Analysis errors
//!
//! Only raised internally; the public estimators log them and fall back to
//! a zero estimate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("FFT failed: {0}")]
    Fft(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
