pub mod error;
pub mod frame;
pub mod types;

pub use error::{Error, Result};
pub use frame::{FRAME_HEADER_SIZE, Frame, MAX_FRAME_SIZE, read_frame, write_frame};
pub use types::{HttpRequest, HttpResponse};
