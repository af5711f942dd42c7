pub mod contracts;
pub mod transport;

pub use contracts::*;
pub use transport::*;
