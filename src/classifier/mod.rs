pub mod dnn;

pub use dnn::DnnClassifier;
