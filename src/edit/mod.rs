mod command;
mod history;

pub use command::*;
pub use history::*;
