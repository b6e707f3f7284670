use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("difficulty of {bits} leading zero bits exceeds the maximum of {max}")]
    DifficultyTooHigh { bits: u32, max: u32 },

    #[error("counter space exhausted without finding valid work")]
    Exhausted,
}
