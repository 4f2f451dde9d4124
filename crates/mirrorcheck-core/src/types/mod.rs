mod fingerprint;
mod manifest;
mod mirror;
mod points;
mod result;

pub use fingerprint::*;
pub use manifest::*;
pub use mirror::*;
pub use points::*;
pub use result::*;
