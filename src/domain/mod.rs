pub mod payment;
pub mod order;
pub mod dispute;

pub use payment::*;
pub use order::*;
pub use dispute::*;
