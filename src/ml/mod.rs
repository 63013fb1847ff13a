pub mod dataset;
pub mod device;
pub mod inference;
pub mod ml_model;
pub mod mobilenet;
pub mod preprocess;
pub mod pretrained;
pub mod training;

pub use dataset::{class_weights, list_images_by_class, ClassWeights, RoiBatch, RoiBatcher, RoiDataset, RoiItem};
pub use device::resolve_device_type;
pub use inference::{decide, InferenceEngine, Prediction, DEFAULT_THRESHOLD};
pub use ml_model::{classification_loss, ModelConfig, RoiClassifier, NUM_CLASSES};
pub use mobilenet::MobileNetV2;
pub use pretrained::{load_backbone_weights, torchvision_key_remap};
pub use preprocess::{decode_bytes, load_image, load_image_with_size, normalize_image, preprocess_input, ImageInput, PixelArray};
pub use training::{run_training, train_model, TrainConfig, TrainReport};
