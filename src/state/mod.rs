pub mod session;
pub mod stability;
pub mod stats;

pub use session::*;
pub use stability::*;
pub use stats::*;
