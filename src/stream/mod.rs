pub mod consumer;
pub mod decoder;

pub use consumer::FragmentStream;
pub use decoder::SseDecoder;
