use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Application image not found: {}", _0.display())]
    AppImageNotFound(PathBuf),
    #[error("Missing merge component: {}", _0.display())]
    MissingComponent(PathBuf),
    #[error("JSON serialization error: {}", _0)]
    JsonError(#[from] serde_json::Error),
    #[error("I/O error: {}", _0)]
    IoError(#[from] io::Error),
}
