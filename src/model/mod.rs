pub mod checkpoint;
pub mod config;
pub mod history;
pub mod model_metadata;
pub mod model_storage;

pub use checkpoint::{BestCheckpoint, BEST_DIR_NAME};
pub use config::{AppConfig, DeviceType, ExportSettings, LabelSettings, ServeSettings, SplitSettings, TrainingSettings};
pub use history::{EpochMetrics, TrainingHistory};
pub use model_metadata::ModelMetadata;
pub use model_storage::{
    is_bundle_path, load_model_any, load_model_bundle, load_model_dir, save_model_bundle, save_model_dir,
};
