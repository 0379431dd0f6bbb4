use super::*;

mod config;
pub use config::*;

pub struct GPTModel {
    pub tok_emb: Embedding,
    pub pos_emb: Embedding,
    pub drop_emb: Dropout,
    pub trf_blocks: Vec<TransformerBlock>,
    pub final_norm: LayerNorm,
    pub out_head: Linear,
    context_length: usize,
    mask: Tensor,
}

impl GPTModel {
    /// Validates `c` and creates every parameter through `vb`.
    ///
    /// The causal mask is built once here; each block's attention holds a
    /// handle onto the same buffer.
    pub fn new(vb: &VarBuilder, c: &GptConfig) -> candle_core::Result<Self> {
        c.validate().map_err(ConfigError::into_candle)?;

        let tok_emb = embedding(c.vocab_size, c.emb_dim, vb.pp("tok_emb"))?;
        let pos_emb = embedding(c.context_length, c.emb_dim, vb.pp("pos_emb"))?;
        let drop_emb = Dropout::new(c.drop_rate);

        let mask = causal_mask(c.context_length, vb.device())?;
        let vbh = vb.pp("trf_blocks");
        let trf_blocks = (0..c.n_layers)
            .map(|i| TransformerBlock::new(&vbh.pp(i), c, mask.clone()))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let final_norm = LayerNorm::new(&vb.pp("final_norm"), c.emb_dim)?;
        let out_head = linear_b(c.emb_dim, c.vocab_size, false, vb.pp("out_head"))?;

        debug!(
            "gpt: {} layers, emb_dim {}, vocab {}, context {}",
            c.n_layers, c.emb_dim, c.vocab_size, c.context_length
        );

        Ok(Self {
            tok_emb,
            pos_emb,
            drop_emb,
            trf_blocks,
            final_norm,
            out_head,
            context_length: c.context_length,
            mask,
        })
    }

    /// Largest sequence length a forward pass accepts.
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn causal_mask(&self) -> &Tensor {
        &self.mask
    }
}

impl ModuleT for GPTModel {
    /// `(batch, seq_len)` u32 token ids -> `(batch, seq_len, vocab_size)` logits.
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let (_, seq_len) = xs.dims2()?;
        if seq_len > self.context_length {
            return Err(ConfigError::ContextOverflow {
                seq_len,
                context_length: self.context_length,
            }
            .into_candle());
        }

        let tok_emb = self.tok_emb.forward_t(xs, train)?;

        // positions always start at 0, whatever the generation step
        let pos_ids = Tensor::arange(0u32, seq_len as u32, xs.device())?;
        let pos_emb = self.pos_emb.embeddings().index_select(&pos_ids, 0)?;

        let x = tok_emb.broadcast_add(&pos_emb)?;
        let mut x = self.drop_emb.forward_t(&x, train)?;

        for t in &self.trf_blocks {
            x = t.forward_t(&x, train)?;
        }

        let x = self.final_norm.forward_t(&x, train)?;
        self.out_head.forward_t(&x, train)
    }
}
