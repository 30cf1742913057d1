pub mod preview;

pub use preview::{PreviewRequest, PreviewResponse, PreviewService};
