use std::path::PathBuf;

use candle_core::DType;
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use eyre::WrapErr;
use scratchgpt::cli::{init_logging, load_config, select_device};
use scratchgpt::{END_OF_TEXT, GPTModel, TextGenerator, Tokenizer};

#[derive(Parser)]
#[command(name = "generate")]
#[command(about = "Continue a prompt with a GPT model", long_about = None)]
struct Args {
    prompt: String,

    /// Model layout as JSON; defaults to the GPT-2 124M preset
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    context_length: Option<usize>,

    /// Weights written by `train --save`; random weights otherwise
    #[arg(long)]
    weights: Option<PathBuf>,

    #[arg(short = 'n', long, default_value_t = 25)]
    max_new_tokens: usize,

    /// 0 decodes greedily
    #[arg(short, long, default_value_t = 0.)]
    temperature: f64,

    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Stop at <|endoftext|>
    #[arg(long)]
    eos: bool,

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

    let mut var_map = VarMap::new();
    let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
    let model = GPTModel::new(&vb, &cfg)?;
    // the variables exist now, load overwrites them in place
    if let Some(path) = &args.weights {
        var_map
            .load(path)
            .wrap_err_with(|| format!("loading weights from {}", path.display()))?;
    }

    let tokenizer = Tokenizer::gpt2()?;
    let idx = tokenizer.text_to_token_ids(&args.prompt, &device)?;

    let mut generator = TextGenerator::new(&model, args.max_new_tokens, cfg.context_length)
        .with_temperature(args.temperature);
    generator.top_k = args.top_k;
    if args.eos {
        generator = generator.with_eos(END_OF_TEXT);
    }

    let out = generator.generate(&mut rand::rng(), idx)?.squeeze(0)?;
    println!("{}", tokenizer.decode_lossy(&out.to_vec1::<u32>()?));
    Ok(())
}
