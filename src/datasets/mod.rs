pub mod registry;

pub use registry::LabelRegistry;
