mod binding;
mod capi;
mod common;
mod fleet;

pub use binding::*;
pub use capi::*;
pub use common::*;
pub use fleet::*;
