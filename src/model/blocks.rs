use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
};

use crate::error::EvaluationError;

/// Bottleneck channel expansion.
pub const EXPANSION: usize = 4;

fn initializer() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    }
}

/// 7x7/2 convolution, batch norm, ReLU and 3x3/2 max pooling.
#[derive(Module, Debug)]
pub struct StemBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    activation: Relu,
    max_pool: MaxPool2d,
}

impl<B: Backend> StemBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.activation.forward(x);

        self.max_pool.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct StemBlockConfig {
    #[config(default = "3")]
    input_channels: usize,
    #[config(default = "64")]
    num_filters: usize,
}

impl StemBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> StemBlock<B> {
        StemBlock {
            conv: Conv2dConfig::new([self.input_channels, self.num_filters], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .with_initializer(initializer())
                .init(device),
            bn: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
            max_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }
}

/// 1x1 projection of the residual path when shape changes.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        self.bn.forward(x)
    }
}

/// Residual bottleneck (1x1, dilated 3x3, 1x1). The stride sits on the 3x3
/// convolution.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    activation: Relu,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let x = self.conv1.forward(x);
        let x = self.bn1.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv3.forward(x);
        let x = self.bn3.forward(x);

        self.activation.forward(x + identity)
    }
}

#[derive(Config, Debug)]
pub struct BottleneckConfig {
    input_channels: usize,
    output_channels: usize,
    #[config(default = "1")]
    stride: usize,
    #[config(default = "1")]
    dilation: usize,
}

impl BottleneckConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Bottleneck<B> {
        let width = self.output_channels / EXPANSION;
        let [stride, dilation] = [self.stride, self.dilation];

        let downsample = (stride != 1 || self.input_channels != self.output_channels).then(|| {
            Downsample {
                conv: Conv2dConfig::new([self.input_channels, self.output_channels], [1, 1])
                    .with_stride([stride, stride])
                    .with_bias(false)
                    .with_initializer(initializer())
                    .init(device),
                bn: BatchNormConfig::new(self.output_channels).init(device),
            }
        });

        Bottleneck {
            conv1: Conv2dConfig::new([self.input_channels, width], [1, 1])
                .with_bias(false)
                .with_initializer(initializer())
                .init(device),
            bn1: BatchNormConfig::new(width).init(device),
            conv2: Conv2dConfig::new([width, width], [3, 3])
                .with_stride([stride, stride])
                .with_dilation([dilation, dilation])
                .with_padding(PaddingConfig2d::Explicit(dilation, dilation))
                .with_bias(false)
                .with_initializer(initializer())
                .init(device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: Conv2dConfig::new([width, self.output_channels], [1, 1])
                .with_bias(false)
                .with_initializer(initializer())
                .init(device),
            bn3: BatchNormConfig::new(self.output_channels).init(device),
            activation: Relu::new(),
            downsample,
        }
    }
}

/// A stage of stacked bottlenecks. Only the first block strides or
/// changes the channel count.
#[derive(Module, Debug)]
pub struct ResidualStage<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> ResidualStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct ResidualStageConfig {
    num_blocks: usize,
    input_channels: usize,
    output_channels: usize,
    #[config(default = "1")]
    stride: usize,
    #[config(default = "1")]
    dilation: usize,
}

impl ResidualStageConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualStage<B> {
        let blocks = (0..self.num_blocks)
            .map(|index| {
                let (input_channels, stride) = if index == 0 {
                    (self.input_channels, self.stride)
                } else {
                    (self.output_channels, 1)
                };

                BottleneckConfig::new(input_channels, self.output_channels)
                    .with_stride(stride)
                    .with_dilation(self.dilation)
                    .init(device)
            })
            .collect();

        ResidualStage { blocks }
    }
}

/// Atrous spatial pyramid pooling head: parallel dilated 3x3 convolutions
/// straight to class logits, summed.
#[derive(Module, Debug)]
pub struct AsppClassifier<B: Backend> {
    head: Conv2d<B>,
    branches: Vec<Conv2d<B>>,
}

impl<B: Backend> AsppClassifier<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.branches
            .iter()
            .fold(self.head.forward(x.clone()), |sum, branch| {
                sum + branch.forward(x.clone())
            })
    }
}

#[derive(Config, Debug)]
pub struct AsppClassifierConfig {
    input_channels: usize,
    num_classes: usize,
    #[config(default = "vec![6, 12, 18, 24]")]
    rates: Vec<usize>,
}

impl AsppClassifierConfig {
    /// Fails when no dilation rate is given.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<AsppClassifier<B>, EvaluationError> {
        let (&first, rest) = self.rates.split_first().ok_or_else(|| {
            EvaluationError::InvalidConfig(
                "ASPP classifier needs at least one dilation rate".to_string(),
            )
        })?;

        Ok(AsppClassifier {
            head: self.branch(first, device),
            branches: rest.iter().map(|&rate| self.branch(rate, device)).collect(),
        })
    }

    fn branch<B: Backend>(&self, rate: usize, device: &B::Device) -> Conv2d<B> {
        Conv2dConfig::new([self.input_channels, self.num_classes], [3, 3])
            .with_dilation([rate, rate])
            .with_padding(PaddingConfig2d::Explicit(rate, rate))
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: 0.01,
            })
            .init(device)
    }
}
