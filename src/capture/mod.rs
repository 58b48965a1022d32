pub mod decoder;
pub mod frame;

pub use decoder::{FrameSource, ImageDirSource, Scale};
pub use frame::{Color, EncodedFrame, PixelGrid};
