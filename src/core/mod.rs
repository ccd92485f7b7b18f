pub mod aggregator;
pub mod frame_store;
pub mod pipeline;
pub mod sampler;
pub mod scorer;

pub use frame_store::FrameStore;
