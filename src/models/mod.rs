mod outcome;
mod purchase;
mod registration;

pub use outcome::*;
pub use purchase::*;
pub use registration::*;
