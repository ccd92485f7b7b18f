use anyhow::{anyhow, bail, Context, Result};
use opencv::{core, dnn, prelude::*};
use std::path::Path;

use crate::core::scorer::{Classifier, FrameTensor};
use crate::utils::logger;

/// ONNX image classifier run through OpenCV's dnn module on the CPU.
/// Expects an NHWC float input and reads the first element of the first output.
pub struct DnnClassifier {
    net: dnn::Net,
    input_width: u32,
    input_height: u32,
}

impl DnnClassifier {
    pub fn load(model_path: &Path, input_width: u32, input_height: u32) -> Result<Self> {
        if !model_path.is_file() {
            bail!("model file not found: {}", model_path.display());
        }

        let path_str = model_path.to_string_lossy();
        let net = dnn::read_net_from_onnx(&path_str)
            .with_context(|| format!("failed to load ONNX model {}", path_str))?;
        if net.empty()? {
            bail!("model {} loaded with no layers", path_str);
        }

        logger::info(&format!(
            "Model loaded successfully: {} (input {}x{})",
            path_str, input_width, input_height
        ));

        Ok(Self {
            net,
            input_width,
            input_height,
        })
    }
}

impl Classifier for DnnClassifier {
    fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    fn classify(&mut self, tensor: &FrameTensor) -> Result<f32> {
        if (tensor.width, tensor.height) != self.input_size() {
            bail!(
                "tensor is {}x{}, model wants {}x{}",
                tensor.width,
                tensor.height,
                self.input_width,
                self.input_height
            );
        }

        let flat = Mat::from_slice(&tensor.data)?;
        let blob = flat.reshape_nd(1, &tensor.shape())?.try_clone()?;

        self.net.set_input(&blob, "", 1.0, core::Scalar::default())?;
        let output = self.net.forward_single("")?;

        let values = output.data_typed::<f32>()?;
        values
            .first()
            .copied()
            .ok_or_else(|| anyhow!("model produced an empty output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_an_error() {
        let err = DnnClassifier::load(Path::new("/nonexistent/xception_model.onnx"), 299, 299)
            .err()
            .unwrap();
        assert!(err.to_string().contains("model file not found"));
    }

    #[test]
    fn test_garbage_model_is_an_error() {
        let path = std::env::temp_dir().join(format!("veriframe_garbage_{}.onnx", std::process::id()));
        std::fs::write(&path, b"this is not protobuf").unwrap();
        assert!(DnnClassifier::load(&path, 299, 299).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
