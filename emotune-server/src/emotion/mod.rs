//! Image to mood pipeline: decode, classify, look up music

pub mod classifier;
pub mod decoder;
pub mod mood;

pub use classifier::{classify, ClassifierError, EmotionClassifier, OnnxEmotionClassifier};
pub use decoder::{decode_data_url, encode_data_url, InvalidImageError};
pub use mood::{music_for_mood, MoodMatch};
