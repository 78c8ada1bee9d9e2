use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChipError {
    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },
}
