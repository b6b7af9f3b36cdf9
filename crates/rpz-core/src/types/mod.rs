mod domain;
mod payload;
mod result;
mod source;
mod zone;

pub use domain::*;
pub use payload::*;
pub use result::*;
pub use source::*;
pub use zone::*;
