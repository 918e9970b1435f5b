mod blocks;
mod deeplab;

pub use blocks::{
    AsppClassifier, AsppClassifierConfig, Bottleneck, BottleneckConfig, Downsample,
    ResidualStage, ResidualStageConfig, StemBlock, StemBlockConfig,
};

pub use deeplab::{DeepLab, DeepLabConfig, Encoder};
