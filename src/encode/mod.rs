pub mod color;
pub mod encoder;

pub use color::ColorApprox;
pub use encoder::Encoder;
