use super::*;

/// Construction-time description of a [`GPTModel`].
///
/// Every field is required: the serde impl carries no defaults, so a JSON
/// document missing any key is rejected at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GptConfig {
    pub vocab_size: usize, // rows of the token embedding matrix, one per token id
    pub context_length: usize, // max number of tokens processed together (rows of the positional embedding)
    pub emb_dim: usize, // width of every token vector flowing through the blocks
    pub n_heads: usize, // attention heads per block, each of width emb_dim / n_heads
    pub n_layers: usize, // number of stacked transformer blocks
    pub drop_rate: f32, // dropout probability used everywhere in the model
    pub qkv_bias: bool, // whether query/key/value projections carry a bias
}

impl GptConfig {
    /// The 124M-parameter GPT-2 layout.
    pub fn gpt2_124m() -> Self {
        Self {
            vocab_size: 50257,
            context_length: 1024,
            emb_dim: 768,
            n_heads: 12,
            n_layers: 12,
            drop_rate: 0.1,
            qkv_bias: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("context_length", self.context_length),
            ("emb_dim", self.emb_dim),
            ("n_heads", self.n_heads),
            ("n_layers", self.n_layers),
        ];
        if let Some((name, _)) = sizes.into_iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.emb_dim % self.n_heads != 0 {
            return Err(ConfigError::HeadsNotDivisible {
                d_out: self.emb_dim,
                num_heads: self.n_heads,
            });
        }
        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(ConfigError::DropRate(self.drop_rate));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.emb_dim / self.n_heads
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(s: &str) -> eyre::Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading model config {}", path.display()))?;
        Self::from_json_str(&raw)
    }
}
