use super::*;

/// Upper-triangular mask of shape `(size, size)`: 1 where `j > i` (a future
/// position), 0 elsewhere.
pub fn causal_mask(size: usize, device: &Device) -> candle_core::Result<Tensor> {
    let mask: Vec<u8> = (0..size)
        .flat_map(|i| (0..size).map(move |j| u8::from(j > i)))
        .collect();
    Tensor::from_slice(&mask, (size, size), device)
}

/// Replaces every entry of `on_false` where `mask` is set with `on_true`.
pub fn masked_fill(on_false: &Tensor, mask: &Tensor, on_true: f32) -> candle_core::Result<Tensor> {
    let shape = mask.shape();
    let on_true = Tensor::new(on_true, on_false.device())?
        .to_dtype(on_false.dtype())?
        .broadcast_as(shape.dims())?;
    mask.where_cond(&on_true, on_false)
}

pub struct MultiHeadAttention {
    pub num_heads: usize, // number of heads in the multi head attention systems
    pub d_out: usize,     // columns of the (big) weight matrix
    pub head_dim: usize,  // columns of the weight matrix for each head
    pub context_length: usize,
    pub w_q: Linear, // (big) query weight
    pub w_k: Linear, // (big) key weight
    pub w_v: Linear, // (big) value weight
    pub out_proj: Linear,
    pub scaling: f64,     // 1 / sqrt(head_dim)
    pub dropout: Dropout, // applied on attention weights
    mask: Tensor,         // (context_length, context_length), never written after construction
}

impl MultiHeadAttention {
    /// Builds the layer with its own causal mask.
    pub fn new(
        vb: &VarBuilder,
        d_in: usize,
        d_out: usize,
        context_length: usize,
        num_heads: usize,
        drop_p: f32,
        qkv_bias: bool,
    ) -> candle_core::Result<Self> {
        let mask = causal_mask(context_length, vb.device())?;
        Self::with_mask(vb, d_in, d_out, num_heads, drop_p, qkv_bias, mask)
    }

    /// Builds the layer around an existing `(context_length, context_length)`
    /// mask. The tensor shares storage with the caller's, so a whole model
    /// can hold a single mask buffer.
    pub fn with_mask(
        vb: &VarBuilder,
        d_in: usize,
        d_out: usize,
        num_heads: usize,
        drop_p: f32,
        qkv_bias: bool,
        mask: Tensor,
    ) -> candle_core::Result<Self> {
        if num_heads == 0 {
            return Err(ConfigError::Zero("num_heads").into_candle());
        }
        if d_out % num_heads != 0 {
            return Err(ConfigError::HeadsNotDivisible { d_out, num_heads }.into_candle());
        }
        let (context_length, cols) = mask.dims2()?;
        if context_length != cols {
            candle_core::bail!("causal mask must be square, got {:?}", mask.dims());
        }

        let head_dim = d_out / num_heads;
        let w_q = linear_b(d_in, d_out, qkv_bias, vb.pp("query"))?;
        let w_k = linear_b(d_in, d_out, qkv_bias, vb.pp("key"))?;
        let w_v = linear_b(d_in, d_out, qkv_bias, vb.pp("value"))?;
        let out_proj = linear_b(d_out, d_out, true, vb.pp("out_proj"))?;

        debug!("attention: {num_heads} heads of width {head_dim}, context {context_length}");

        Ok(Self {
            num_heads,
            d_out,
            head_dim,
            context_length,
            w_q,
            w_k,
            w_v,
            out_proj,
            scaling: 1. / (head_dim as f64).sqrt(),
            dropout: Dropout::new(drop_p),
            mask,
        })
    }

    pub fn from_config(vb: &VarBuilder, c: &GptConfig, mask: Tensor) -> candle_core::Result<Self> {
        Self::with_mask(vb, c.emb_dim, c.emb_dim, c.n_heads, c.drop_rate, c.qkv_bias, mask)
    }

    pub fn mask(&self) -> &Tensor {
        &self.mask
    }

    // (b, num_tokens, d_out) -> (b, num_heads, num_tokens, head_dim)
    fn split_heads(&self, xs: Tensor, b: usize, num_tokens: usize) -> candle_core::Result<Tensor> {
        xs.reshape((b, num_tokens, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

impl ModuleT for MultiHeadAttention {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let (b, num_tokens, _) = xs.dims3()?;
        if num_tokens > self.context_length {
            return Err(ConfigError::ContextOverflow {
                seq_len: num_tokens,
                context_length: self.context_length,
            }
            .into_candle());
        }

        let queries = self.split_heads(self.w_q.forward_t(xs, train)?, b, num_tokens)?;
        let keys = self.split_heads(self.w_k.forward_t(xs, train)?, b, num_tokens)?;
        let values = self.split_heads(self.w_v.forward_t(xs, train)?, b, num_tokens)?;

        // (b, num_heads, num_tokens, num_tokens)
        let att_scores = queries.matmul(&keys.transpose(2, 3)?.contiguous()?)?;

        let mask = self
            .mask
            .narrow(0, 0, num_tokens)?
            .narrow(1, 0, num_tokens)?
            .broadcast_as((b, self.num_heads, num_tokens, num_tokens))?;
        let masked = masked_fill(&att_scores, &mask, f32::NEG_INFINITY)?;

        let att_weights = softmax(&(masked * self.scaling)?, D::Minus1)?;
        let att_weights = self.dropout.forward_t(&att_weights, train)?;

        // back to (b, num_tokens, d_out) with heads laid side by side
        let ctx_vec = att_weights
            .matmul(&values)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, num_tokens, self.d_out))?;

        self.out_proj.forward_t(&ctx_vec, train)
    }
}
