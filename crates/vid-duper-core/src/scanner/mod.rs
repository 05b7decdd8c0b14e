pub mod walk;

pub use walk::{gather_videos, normalize_extensions};
