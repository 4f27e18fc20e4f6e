//! Minimal image containers used by the detection engine.
//!
//! Frames arrive as packed 8-bit buffers (see [`crate::frame::Frame`]); the
//! engine converts the region of interest into an owned [`ImageF32`] and
//! works on that. [`ImageU8`] is a borrowed view used for edge maps and
//! debug output.

pub mod f32;
pub mod io;
pub mod traits;
pub mod u8;

pub use self::f32::ImageF32;
pub use self::io::{
    frame_to_dynamic_image, load_frame, save_frame_png, save_grayscale_u8, write_json_file,
    ImageIoError,
};
pub use self::traits::{ImageView, ImageViewMut};
pub use self::u8::ImageU8;
