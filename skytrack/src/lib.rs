pub mod category;
mod error;
pub mod export;
pub mod fetch;
pub mod sheets;
pub mod store;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
