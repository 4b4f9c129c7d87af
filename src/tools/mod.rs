pub mod locator;
pub mod runner;

pub use locator::{
    find_executable, DirectoryToolResolver, StaticToolResolver, ToolKind, ToolResolver,
};
pub use runner::{ToolOutput, ToolRunner};
