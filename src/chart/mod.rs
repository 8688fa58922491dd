mod item;
mod loader;
mod timeline;

pub use item::*;
pub use loader::*;
pub use timeline::*;
