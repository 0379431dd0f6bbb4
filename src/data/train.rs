use super::*;

/// Next-token cross entropy over a model's logits.
pub struct CrossEntropy {
    pub device: Device,
}

impl Default for CrossEntropy {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
        }
    }
}

impl CrossEntropy {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
        }
    }

    /// Mean loss of one batch as a (differentiable) scalar tensor.
    pub fn calc_loss_batch(
        &self,
        model: &GPTModel,
        input_batch: &Tensor,
        target_batch: &Tensor,
        train: bool,
    ) -> candle_core::Result<Tensor> {
        let input_batch = input_batch.to_device(&self.device)?;
        let target_batch = target_batch.to_device(&self.device)?;

        let logits = model.forward_t(&input_batch, train)?;

        // (batch * seq_len, vocab) against (batch * seq_len)
        let logits_flat = logits.flatten(0, 1)?;
        let targets_flat = target_batch.flatten_all()?;
        candle_nn::loss::cross_entropy(&logits_flat, &targets_flat)
    }

    /// Average eval-mode loss over the first `num_batches` batches of
    /// `loader` (all of them when `None`, never more than it holds).
    ///
    /// An empty loader yields `NaN` instead of an error.
    pub fn calc_loss_loader(
        &self,
        model: &GPTModel,
        loader: &DataLoader,
        num_batches: Option<usize>,
    ) -> eyre::Result<f32> {
        if loader.is_empty() {
            return Ok(f32::NAN);
        }
        let num_batches = num_batches.map_or(loader.len(), |n| n.min(loader.len()));
        if num_batches == 0 {
            return Ok(f32::NAN);
        }

        let mut total_loss = 0.;
        for batch in loader.batches().take(num_batches) {
            let (input_batch, target_batch) = batch?;
            let loss = self.calc_loss_batch(model, &input_batch, &target_batch, false)?;
            total_loss += loss.to_scalar::<f32>()?;
        }
        Ok(total_loss / num_batches as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub num_epochs: usize,
    /// Evaluate every `eval_freq` optimizer steps (step 0 included).
    pub eval_freq: usize,
    /// Batches per split used for each evaluation.
    pub eval_iter: usize,
    /// Prompt used for the end-of-epoch sample.
    pub start_context: String,
    pub sample_tokens: usize,
    pub sample_top_k: Option<usize>,
    pub sample_temperature: f64,
}

impl TrainingConfig {
    pub fn new(num_epochs: usize, eval_freq: usize, eval_iter: usize, start_context: &str) -> Self {
        Self {
            num_epochs,
            eval_freq,
            eval_iter,
            start_context: start_context.to_string(),
            sample_tokens: 10,
            sample_top_k: Some(25),
            sample_temperature: 1.4,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eval_freq == 0 {
            return Err(ConfigError::Zero("eval_freq"));
        }
        if self.eval_iter == 0 {
            return Err(ConfigError::Zero("eval_iter"));
        }
        if self.start_context.is_empty() {
            return Err(ConfigError::EmptyPrompt);
        }
        Ok(())
    }
}

/// Loss curves recorded at every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    pub train_losses: Vec<f32>,
    pub val_losses: Vec<f32>,
    pub tokens_seen: Vec<usize>,
}

pub struct Trainer<O: Optimizer> {
    pub entropy: CrossEntropy,
    pub optimizer: O,
    pub config: TrainingConfig,
}

impl<O: Optimizer> Trainer<O> {
    pub fn new(entropy: CrossEntropy, optimizer: O, config: TrainingConfig) -> Self {
        Self {
            entropy,
            optimizer,
            config,
        }
    }

    pub fn train<R: Rng + ?Sized>(
        &mut self,
        model: &GPTModel,
        train_loader: &DataLoader,
        val_loader: &DataLoader,
        tokenizer: &Tokenizer,
        rng: &mut R,
    ) -> eyre::Result<TrainingHistory> {
        self.config.validate()?;

        let mut history = TrainingHistory::default();
        let mut tokens_seen = 0;
        let mut global_step = 0_usize;

        for epoch in 0..self.config.num_epochs {
            for batch in train_loader.batches() {
                let (input_batch, target_batch) = batch?;
                let loss =
                    self.entropy
                        .calc_loss_batch(model, &input_batch, &target_batch, true)?;
                self.optimizer.backward_step(&loss)?;
                tokens_seen += input_batch.elem_count();

                if global_step % self.config.eval_freq == 0 {
                    let (train_loss, val_loss) = self.evaluate(model, train_loader, val_loader)?;
                    history.train_losses.push(train_loss);
                    history.val_losses.push(val_loss);
                    history.tokens_seen.push(tokens_seen);
                    info!(
                        "Ep {} (Step {global_step:06}): Train loss {train_loss:.3}, Val loss {val_loss:.3}",
                        epoch + 1
                    );
                }
                global_step += 1;
            }

            let sample = self.generate_sample(model, tokenizer, rng)?;
            info!("Ep {} sample: {}", epoch + 1, sample.replace('\n', " "));
        }

        Ok(history)
    }

    /// Eval-mode losses over `eval_iter` batches of each split.
    pub fn evaluate(
        &self,
        model: &GPTModel,
        train_loader: &DataLoader,
        val_loader: &DataLoader,
    ) -> eyre::Result<(f32, f32)> {
        let n = Some(self.config.eval_iter);
        let train_loss = self.entropy.calc_loss_loader(model, train_loader, n)?;
        let val_loss = self.entropy.calc_loss_loader(model, val_loader, n)?;
        Ok((train_loss, val_loss))
    }

    /// Continues `start_context` with the configured sampling settings,
    /// using the model's full context length.
    pub fn generate_sample<R: Rng + ?Sized>(
        &self,
        model: &GPTModel,
        tokenizer: &Tokenizer,
        rng: &mut R,
    ) -> eyre::Result<String> {
        let c = &self.config;
        let encoded = tokenizer.text_to_token_ids(&c.start_context, &self.entropy.device)?;
        let mut generator = TextGenerator::new(model, c.sample_tokens, model.context_length())
            .with_temperature(c.sample_temperature);
        generator.top_k = c.sample_top_k;
        let token_ids = generator.generate(rng, encoded)?.squeeze(0)?;
        Ok(tokenizer.decode_lossy(&token_ids.to_vec1::<u32>()?))
    }
}
