use std::fs;
use std::path::PathBuf;

use candle_core::DType;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use clap::Parser;
use eyre::WrapErr;
use log::info;
use scratchgpt::cli::{init_logging, load_config, select_device};
use scratchgpt::{
    CrossEntropy, GPTModel, LoaderConfig, Tokenizer, Trainer, TrainingConfig, create_data_loader,
    train_val_split,
};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a GPT model on a plain text file", long_about = None)]
struct Args {
    /// Training corpus (UTF-8 text)
    text: PathBuf,

    /// Model layout as JSON; defaults to the GPT-2 124M preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the context length of the model
    #[arg(long)]
    context_length: Option<usize>,

    #[arg(long, default_value_t = 10)]
    epochs: usize,

    #[arg(long, default_value_t = 2)]
    batch_size: usize,

    /// Window stride; defaults to the context length
    #[arg(long)]
    stride: Option<usize>,

    #[arg(long, default_value_t = 0.9)]
    train_ratio: f64,

    #[arg(long, default_value_t = 0.0004)]
    lr: f64,

    #[arg(long, default_value_t = 0.1)]
    weight_decay: f64,

    #[arg(long, default_value_t = 5)]
    eval_freq: usize,

    #[arg(long, default_value_t = 5)]
    eval_iter: usize,

    /// Prompt continued after every epoch
    #[arg(long, default_value = "Every effort moves you")]
    start_context: String,

    /// Write the trained weights (safetensors)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write the loss history (JSON)
    #[arg(long)]
    history: Option<PathBuf>,

    #[arg(long)]
    cpu: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let device = select_device(args.cpu)?;
    let cfg = load_config(args.config.as_ref(), args.context_length)?;

    let var_map = VarMap::new();
    let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
    let model = GPTModel::new(&vb, &cfg)?;
    let tokenizer = Tokenizer::gpt2()?;

    let text = fs::read_to_string(&args.text)
        .wrap_err_with(|| format!("reading {}", args.text.display()))?;
    let (train_text, val_text) = train_val_split(&text, args.train_ratio);

    let train_cfg = LoaderConfig {
        batch_size: args.batch_size,
        max_length: cfg.context_length,
        stride: args.stride.unwrap_or(cfg.context_length),
        shuffle: true,
        drop_last: true,
    };
    let val_cfg = LoaderConfig {
        shuffle: false,
        drop_last: false,
        ..train_cfg.clone()
    };
    let train_loader = create_data_loader(train_text, &tokenizer, &train_cfg, &device)?;
    let val_loader = create_data_loader(val_text, &tokenizer, &val_cfg, &device)?;
    info!(
        "{} training batches, {} validation batches",
        train_loader.len(),
        val_loader.len()
    );

    let optimizer = AdamW::new(
        var_map.all_vars(),
        ParamsAdamW {
            lr: args.lr,
            weight_decay: args.weight_decay,
            ..Default::default()
        },
    )?;
    let config = TrainingConfig::new(
        args.epochs,
        args.eval_freq,
        args.eval_iter,
        &args.start_context,
    );
    let mut trainer = Trainer::new(CrossEntropy::new(&device), optimizer, config);
    let history = trainer.train(
        &model,
        &train_loader,
        &val_loader,
        &tokenizer,
        &mut rand::rng(),
    )?;

    if let (Some(train), Some(val)) = (history.train_losses.last(), history.val_losses.last()) {
        println!("final train loss {train:.3}, val loss {val:.3}");
    }

    if let Some(path) = &args.save {
        var_map
            .save(path)
            .wrap_err_with(|| format!("saving weights to {}", path.display()))?;
        info!("weights written to {}", path.display());
    }
    if let Some(path) = &args.history {
        fs::write(path, serde_json::to_string_pretty(&history)?)
            .wrap_err_with(|| format!("writing history to {}", path.display()))?;
    }

    Ok(())
}
