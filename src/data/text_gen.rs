use super::*;

/// Outcome of one decoding step.
pub enum Step {
    /// The sequence extended by one token per batch row.
    Continue(Tensor),
    /// Every row produced the end-of-sequence id; nothing was appended.
    Eos,
}

/// Autoregressive decoder over a borrowed model.
///
/// Runs in eval mode (no dropout) and detaches logits, so decoding never
/// touches parameters or builds a gradient graph.
pub struct TextGenerator<'m> {
    pub model: &'m GPTModel,
    pub max_new_tokens: usize,
    pub context_size: usize,
    /// `0.0` selects the arg-max token; anything above samples.
    pub temperature: f64,
    pub top_k: Option<usize>,
    pub eos_id: Option<u32>,
}

impl<'m> TextGenerator<'m> {
    /// Greedy decoding with no top-k restriction and no end token.
    pub fn new(model: &'m GPTModel, max_new_tokens: usize, context_size: usize) -> Self {
        Self {
            model,
            max_new_tokens,
            context_size,
            temperature: 0.,
            top_k: None,
            eos_id: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_eos(mut self, eos_id: u32) -> Self {
        self.eos_id = Some(eos_id);
        self
    }

    fn validate(&self) -> eyre::Result<()> {
        ensure!(self.context_size > 0, "context_size must be greater than zero");
        ensure!(self.top_k != Some(0), "top_k must be greater than zero");
        ensure!(
            self.temperature.is_finite() && self.temperature >= 0.,
            "temperature must be a non-negative number, got {}",
            self.temperature
        );
        Ok(())
    }

    /// Extends `idx` (`(batch, seq_len)` u32) by up to `max_new_tokens`.
    ///
    /// Stops early, without appending it, once every row yields `eos_id`.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, idx: Tensor) -> eyre::Result<Tensor> {
        self.validate()?;
        let (_b, seq_len) = idx.dims2()?;
        ensure!(seq_len > 0, "prompt must contain at least one token");
        let mut idx = idx;
        for i in 0..self.max_new_tokens {
            match self.step(rng, &idx)? {
                Step::Continue(next) => idx = next,
                Step::Eos => {
                    debug!("end of sequence after {i} new tokens");
                    break;
                }
            }
        }
        Ok(idx)
    }

    pub fn step<R: Rng + ?Sized>(&self, rng: &mut R, idx: &Tensor) -> eyre::Result<Step> {
        let idx_next = self.next_token(rng, idx)?;

        if let Some(eos) = self.eos_id {
            let all_eos = idx_next.flatten_all()?.to_vec1::<u32>()?.iter().all(|&t| t == eos);
            if all_eos {
                return Ok(Step::Eos);
            }
        }

        Ok(Step::Continue(Tensor::cat(&[idx, &idx_next], D::Minus1)?))
    }

    /// Picks the next token for every row: `(batch, 1)` u32.
    pub fn next_token<R: Rng + ?Sized>(&self, rng: &mut R, idx: &Tensor) -> eyre::Result<Tensor> {
        // Limit the context window
        let (_b, seq_len) = idx.dims2()?;
        ensure!(seq_len > 0, "prompt must contain at least one token");
        let start = seq_len.saturating_sub(self.context_size);
        let idx_cond = idx.i((.., start..seq_len))?;

        let logits = self.model.forward_t(&idx_cond, false)?.detach();

        // Get last logits
        let (_b, c, _vocab_size) = logits.dims3()?;
        let logits = logits.i((.., c - 1, ..))?.to_dtype(DType::F32)?;

        let logits = match self.top_k {
            Some(k) => apply_top_k(&logits, k)?,
            None => logits,
        };

        if self.temperature > 0. {
            Self::sample(rng, &(logits / self.temperature)?)
        } else {
            Ok(logits.argmax_keepdim(D::Minus1)?)
        }
    }

    fn sample<R: Rng + ?Sized>(rng: &mut R, logits: &Tensor) -> eyre::Result<Tensor> {
        let probas = softmax(logits, D::Minus1)?.to_vec2::<f32>()?;
        let batch_size = probas.len();

        let idx_next = probas
            .iter()
            .map(|row| {
                let dist = WeightedIndex::<f32>::new(row).map_err(|e| eyre!("{e}"))?;
                Ok(dist.sample(&mut *rng) as u32)
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        Ok(Tensor::from_vec(idx_next, (batch_size, 1_usize), logits.device())?)
    }
}

/// Sets every logit below the k-th largest of its row to negative infinity.
pub fn apply_top_k(logits: &Tensor, k: usize) -> candle_core::Result<Tensor> {
    if k == 0 {
        candle_core::bail!("top_k must be greater than zero");
    }
    if k >= logits.dim(D::Minus1)? {
        return Ok(logits.clone());
    }
    // k-th largest of every row, found on the host: candle's CUDA sort keeps a
    // whole row in shared memory, which a GPT-2 sized vocabulary overflows
    let rows = logits.to_dtype(DType::F32)?.to_vec2::<f32>()?;
    let num_rows = rows.len();
    let kth: Vec<f32> = rows
        .into_iter()
        .map(|mut row| *row.select_nth_unstable_by(k - 1, |a, b| b.total_cmp(a)).1)
        .collect();
    let kth = Tensor::from_vec(kth, (num_rows, 1_usize), logits.device())?
        .to_dtype(logits.dtype())?;
    let below = logits.broadcast_lt(&kth)?;
    masked_fill(logits, &below, f32::NEG_INFINITY)
}
