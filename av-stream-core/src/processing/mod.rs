pub mod format_selector;
pub mod frame_codec;
pub mod latest_frame;
pub mod pixel_convert;
