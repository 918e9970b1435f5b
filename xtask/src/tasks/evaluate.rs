use std::path::PathBuf;

use anyhow::Result;
use burn::config::Config;
use clap::Args;
use deeplab_eval::{
    DeepLabConfig, Encoder, EvaluationConfig, Evaluator, ModelSegmenter, Prefetcher, VocDataset,
};

#[cfg(feature = "wgpu")]
type EvalBackend = burn::backend::Wgpu<f32, i32>;
#[cfg(not(feature = "wgpu"))]
type EvalBackend = burn::backend::NdArray<f32>;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory containing the dataset (e.g. VOCdevkit/VOC2012)
    #[arg(long, default_value = "VOCdevkit/VOC2012")]
    pub data_dir: PathBuf,

    /// File listing `image label` path pairs relative to the data directory
    #[arg(long, default_value = "dataset/val.txt")]
    pub data_list: PathBuf,

    /// Label value excluded from the metrics
    #[arg(long, default_value_t = 255)]
    pub ignore_label: u32,

    /// Number of classes to predict, background included
    #[arg(long, default_value_t = 21)]
    pub num_classes: usize,

    /// Number of images to evaluate
    #[arg(long, default_value_t = 1449)]
    pub num_steps: usize,

    /// Checkpoint to restore model parameters from
    #[arg(long, default_value = "model/deeplab")]
    pub restore_from: PathBuf,

    /// Encoder of the pretrained model: res101 or res50
    #[arg(long, default_value = "res50")]
    pub encoder_name: Encoder,

    /// Print progress every N images
    #[arg(long, default_value_t = 100)]
    pub log_every: usize,

    /// Number of decoded images buffered ahead of the model
    #[arg(long, default_value_t = 4)]
    pub prefetch: usize,

    /// Write the full report, per-class IoU included, as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn run(args: &EvaluateArgs) -> Result<()> {
    let config = EvaluationConfig::new()
        .with_num_classes(args.num_classes)
        .with_ignore_label(args.ignore_label)
        .with_num_steps(args.num_steps)
        .with_log_every(args.log_every)
        .with_prefetch_capacity(args.prefetch);
    config.validate()?;

    let dataset = VocDataset::from_list_file(&args.data_dir, &args.data_list)?;

    let device = Default::default();
    tracing::info!(
        encoder = args.encoder_name.name(),
        num_classes = args.num_classes,
        "creating DeepLab model"
    );
    let model_config =
        DeepLabConfig::new(args.num_classes).with_encoder(args.encoder_name.clone());
    let segmenter =
        ModelSegmenter::<EvalBackend>::restore(&model_config, &args.restore_from, &device)?;
    println!(
        "Restored model parameters from {}",
        args.restore_from.display()
    );

    let mut prefetcher = Prefetcher::spawn(
        dataset.into_cycled_items(config.num_steps),
        config.prefetch_capacity,
    );

    let result = Evaluator::new(segmenter, config)
        .run(&mut prefetcher, |step| println!("step {step}"));

    // The reader is joined before any result is reported.
    prefetcher.shutdown()?;
    let report = result?;

    for (class, iou) in report.class_iou.iter().enumerate() {
        match iou {
            Some(iou) => tracing::info!(class, iou, "class IoU"),
            None => tracing::info!(class, "class absent from labels and predictions"),
        }
    }

    println!("Mean IoU: {:.3}", report.mean_iou);
    println!("Pixel Accuracy: {:.3}", report.pixel_accuracy);

    if let Some(path) = &args.report {
        report.save(path)?;
        tracing::info!(path = %path.display(), "saved report");
    }

    Ok(())
}
