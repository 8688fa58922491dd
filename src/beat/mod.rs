mod pos;
mod tempo;

pub use pos::*;
pub use tempo::*;
