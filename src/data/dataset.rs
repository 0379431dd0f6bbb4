use super::*;

/// Splits `text` at `train_ratio` of its characters: the head trains, the
/// tail validates.
pub fn train_val_split(text: &str, train_ratio: f64) -> (&str, &str) {
    let num_chars = text.chars().count();
    let split_chars = (train_ratio.clamp(0., 1.) * num_chars as f64) as usize;
    let split_at = text
        .char_indices()
        .nth(split_chars)
        .map_or(text.len(), |(i, _)| i);
    text.split_at(split_at)
}

/// Overlapping `(input, target)` windows over a token stream, the target
/// being the input shifted one token to the right.
///
/// Window starts are `0, stride, 2 * stride, ...` while
/// `start < tokens.len() - max_length`.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    inputs: Vec<Vec<u32>>,
    targets: Vec<Vec<u32>>,
    max_length: usize,
}

impl WindowedDataset {
    pub fn new(token_ids: &[u32], max_length: usize, stride: usize) -> Result<Self, ConfigError> {
        if max_length == 0 {
            return Err(ConfigError::Zero("max_length"));
        }
        if stride == 0 {
            return Err(ConfigError::Zero("stride"));
        }

        let (inputs, targets) = token_ids
            .windows(max_length + 1)
            .step_by(stride)
            .map(|window| (window[..max_length].to_vec(), window[1..].to_vec()))
            .unzip();

        Ok(Self {
            inputs,
            targets,
            max_length,
        })
    }

    pub fn from_text(
        text: &str,
        tokenizer: &Tokenizer,
        max_length: usize,
        stride: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(&tokenizer.encode(text), max_length, stride)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn get(&self, idx: usize) -> Option<(&[u32], &[u32])> {
        let input = self.inputs.get(idx)?;
        let target = self.targets.get(idx)?;
        Some((input.as_slice(), target.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u32], &[u32])> {
        self.inputs
            .iter()
            .zip(&self.targets)
            .map(|(i, t)| (i.as_slice(), t.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub max_length: usize,
    pub stride: usize,
    pub shuffle: bool,
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            max_length: 256,
            stride: 256,
            shuffle: true,
            drop_last: true,
        }
    }
}

/// Batches a [`WindowedDataset`] into `(batch, max_length)` u32 tensors.
///
/// [`DataLoader::batches`] can be called any number of times; each call is a
/// fresh pass (reshuffled when `shuffle` is set).
pub struct DataLoader {
    dataset: WindowedDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    device: Device,
}

impl DataLoader {
    pub fn new(
        dataset: WindowedDataset,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
        device: &Device,
    ) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        Ok(Self {
            dataset,
            batch_size,
            shuffle,
            drop_last,
            device: device.clone(),
        })
    }

    pub fn dataset(&self) -> &WindowedDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches in one pass.
    pub fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches(&self) -> impl Iterator<Item = candle_core::Result<(Tensor, Tensor)>> + '_ {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rng());
        }
        let chunks: Vec<Vec<usize>> = order
            .chunks(self.batch_size)
            .take(self.len())
            .map(<[usize]>::to_vec)
            .collect();

        chunks.into_iter().map(move |chunk| self.stack(&chunk))
    }

    fn stack(&self, indices: &[usize]) -> candle_core::Result<(Tensor, Tensor)> {
        let rows = indices.len();
        let cols = self.dataset.max_length;
        let mut inputs = Vec::with_capacity(rows * cols);
        let mut targets = Vec::with_capacity(rows * cols);
        for &i in indices {
            inputs.extend_from_slice(&self.dataset.inputs[i]);
            targets.extend_from_slice(&self.dataset.targets[i]);
        }
        Ok((
            Tensor::from_vec(inputs, (rows, cols), &self.device)?,
            Tensor::from_vec(targets, (rows, cols), &self.device)?,
        ))
    }
}

/// Tokenizes `text` and wraps its windows in a loader.
pub fn create_data_loader(
    text: &str,
    tokenizer: &Tokenizer,
    cfg: &LoaderConfig,
    device: &Device,
) -> eyre::Result<DataLoader> {
    let dataset = WindowedDataset::from_text(text, tokenizer, cfg.max_length, cfg.stride)?;
    debug!(
        "{} windows of {} tokens (stride {})",
        dataset.len(),
        cfg.max_length,
        cfg.stride
    );
    let loader = DataLoader::new(dataset, cfg.batch_size, cfg.shuffle, cfg.drop_last, device)?;
    Ok(loader)
}
