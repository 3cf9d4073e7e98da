pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use utils::{done_mark, format_timestamp, progress_bar, progress_color, truncate};
