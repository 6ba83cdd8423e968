pub mod code;
pub mod error;
pub mod model;
pub mod repository;

pub use error::{CoreError, ErrorKind};

pub type CoreResult<T> = Result<T, CoreError>;
