//! The state document: path access, change detection and the container
//! that owns the canonical copy.

mod change;
mod container;
mod path;

pub use change::{values_equal, EqualityPolicy};
pub use container::StateContainer;
pub use path::{get_path, is_nested, paths_overlap, set_path, PATH_SEPARATOR};
