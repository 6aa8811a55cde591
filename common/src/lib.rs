pub mod constants;
pub mod error;
pub mod gauge;
pub mod parameters;
pub mod store;

pub use constants::*;
pub use error::*;
pub use gauge::*;
pub use parameters::*;
pub use store::*;
