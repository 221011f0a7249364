//! Model export and serialization module
//!
//! Native bincode envelope for saving and reloading fitted classifiers.

mod serializer;

pub use serializer::{final_model_path, load_model, save_model, ModelMetadata, SerializedModel};
