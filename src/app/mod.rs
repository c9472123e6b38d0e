pub mod error;

pub use error::{MagpieError, Result};
