pub use platform::{Platform, default_string};

pub mod arch;
pub mod os;
mod platform;
