use std::str::FromStr;

use burn::prelude::*;

use super::blocks::{
    AsppClassifier, AsppClassifierConfig, EXPANSION, ResidualStage, ResidualStageConfig,
    StemBlock, StemBlockConfig,
};
use crate::error::EvaluationError;

/// ResNet depth used as the DeepLab encoder.
#[derive(Config, Debug)]
pub enum Encoder {
    Res50,
    Res101,
}

impl Encoder {
    pub const NAMES: [&'static str; 2] = ["res101", "res50"];

    /// Number of bottleneck blocks in each of the four stages.
    pub fn blocks(&self) -> [usize; 4] {
        match self {
            Encoder::Res50 => [3, 4, 6, 3],
            Encoder::Res101 => [3, 4, 23, 3],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Encoder::Res50 => "res50",
            Encoder::Res101 => "res101",
        }
    }
}

impl FromStr for Encoder {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "res50" => Ok(Encoder::Res50),
            "res101" => Ok(Encoder::Res101),
            other => Err(EvaluationError::UnknownEncoder(other.to_string())),
        }
    }
}

/// DeepLab-v2: a ResNet whose last two stages trade stride for dilation
/// (output stride 8), followed by an ASPP classifier.
#[derive(Module, Debug)]
pub struct DeepLab<B: Backend> {
    stem: StemBlock<B>,
    layer1: ResidualStage<B>,
    layer2: ResidualStage<B>,
    layer3: ResidualStage<B>,
    layer4: ResidualStage<B>,
    classifier: AsppClassifier<B>,

    num_classes: usize,
}

#[derive(Config, Debug)]
pub struct DeepLabConfig {
    num_classes: usize,
    #[config(default = "Encoder::Res50")]
    encoder: Encoder,
    #[config(default = "64")]
    base_channels: usize,
    #[config(default = "vec![6, 12, 18, 24]")]
    aspp_rates: Vec<usize>,
}

impl DeepLabConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DeepLab<B>, EvaluationError> {
        let [b1, b2, b3, b4] = self.encoder.blocks();
        let c = self.base_channels;

        Ok(DeepLab {
            stem: StemBlockConfig::new().with_num_filters(c).init(device),
            layer1: ResidualStageConfig::new(b1, c, c * EXPANSION).init(device),
            layer2: ResidualStageConfig::new(b2, c * EXPANSION, c * 2 * EXPANSION)
                .with_stride(2)
                .init(device),
            layer3: ResidualStageConfig::new(b3, c * 2 * EXPANSION, c * 4 * EXPANSION)
                .with_dilation(2)
                .init(device),
            layer4: ResidualStageConfig::new(b4, c * 4 * EXPANSION, c * 8 * EXPANSION)
                .with_dilation(4)
                .init(device),
            classifier: AsppClassifierConfig::new(c * 8 * EXPANSION, self.num_classes)
                .with_rates(self.aspp_rates.clone())
                .init(device)?,
            num_classes: self.num_classes,
        })
    }
}

impl<B: Backend> DeepLab<B> {
    pub const OUTPUT_STRIDE: usize = 8;

    /// Class logits at 1/8 of the input resolution, `[batch, classes, h, w]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem.forward(images);
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        self.classifier.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn parses_encoder_names() {
        assert!(matches!("res50".parse::<Encoder>(), Ok(Encoder::Res50)));
        assert!(matches!("res101".parse::<Encoder>(), Ok(Encoder::Res101)));
        assert!(matches!(
            "res152".parse::<Encoder>(),
            Err(EvaluationError::UnknownEncoder(name)) if name == "res152"
        ));

        for name in Encoder::NAMES {
            assert_eq!(name.parse::<Encoder>().unwrap().name(), name);
        }
    }

    #[test]
    fn encoder_depths() {
        assert_eq!(Encoder::Res50.blocks().iter().sum::<usize>(), 16);
        assert_eq!(Encoder::Res101.blocks().iter().sum::<usize>(), 33);
    }

    #[test]
    fn forward_keeps_output_stride_eight() {
        let device = Default::default();
        let model = DeepLabConfig::new(5)
            .with_base_channels(8)
            .init::<TestBackend>(&device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 48], &device);
        let logits = model.forward(images);

        assert_eq!(model.num_classes(), 5);
        assert_eq!(logits.dims(), [1, 5, 4, 6]);
    }

    #[test]
    fn single_rate_classifier_keeps_shape() {
        let device = Default::default();
        let model = DeepLabConfig::new(2)
            .with_base_channels(4)
            .with_aspp_rates(vec![1])
            .init::<TestBackend>(&device)
            .unwrap();

        let logits = model.forward(Tensor::zeros([1, 3, 16, 16], &device));

        assert_eq!(logits.dims(), [1, 2, 2, 2]);
    }

    #[test]
    fn empty_aspp_rates_are_rejected() {
        let device = Default::default();
        let result = DeepLabConfig::new(3)
            .with_base_channels(4)
            .with_aspp_rates(vec![])
            .init::<TestBackend>(&device);

        assert!(matches!(result, Err(EvaluationError::InvalidConfig(_))));
    }
}
