use super::*;

/// Convert verbosity count to log level string
pub fn verbosity_to_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` picks the level.
pub fn init_logging(verbose: u8) {
    let env = env_logger::Env::default().default_filter_or(verbosity_to_log_level(verbose));
    env_logger::Builder::from_env(env).init();
}

pub fn select_device(cpu: bool) -> candle_core::Result<Device> {
    if cpu {
        return Ok(Device::Cpu);
    }
    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0)?
    } else {
        Device::Cpu
    };
    debug!("running on {device:?}");
    Ok(device)
}

/// Model layout from a JSON file, or the GPT-2 124M preset with its context
/// length overridden.
pub fn load_config<P: AsRef<Path>>(
    path: Option<P>,
    context_length: Option<usize>,
) -> eyre::Result<GptConfig> {
    let mut cfg = match path {
        Some(path) => GptConfig::from_json_file(path)?,
        None => GptConfig::gpt2_124m(),
    };
    if let Some(context_length) = context_length {
        cfg.context_length = context_length;
        cfg.validate()?;
    }
    Ok(cfg)
}
