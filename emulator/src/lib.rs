pub mod codec;
pub mod constants;
pub mod image;
pub mod runtime;

pub use self::image::{Image, LoadError};
pub use self::runtime::{Computer, ProcessorError, Status};
