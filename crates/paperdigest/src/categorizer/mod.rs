pub mod classifier;

pub use classifier::{Category, ClassificationSubject, Classifier};
