pub mod offline;
pub mod placeholder;
pub mod splitter;

pub use offline::{run_labeling, ImageViewer, LabelSummary, NoViewer, SystemViewer};
pub use placeholder::{ensure_placeholder_data, MIN_PER_CLASS};
pub use splitter::{split_raw, val_count, ClassSplit};
