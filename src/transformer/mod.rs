pub use super::*;
mod attention;
pub use attention::*;

mod feed_forward;
pub use feed_forward::*;

/// Pre-norm block:
///
/// ```text
/// x1 = x  + drop(attn(norm_1(x)))
/// x2 = x1 + drop(ff(norm_2(x1)))
/// ```
pub struct TransformerBlock {
    pub norm_1: LayerNorm,
    pub multi_head: MultiHeadAttention,
    pub norm_2: LayerNorm,
    pub feed_forward: FeedForward,
    pub drop_shortcut: Dropout,
}

impl TransformerBlock {
    pub fn new(vb: &VarBuilder, c: &GptConfig, mask: Tensor) -> candle_core::Result<Self> {
        let norm_1 = LayerNorm::new(&vb.pp("norm_1"), c.emb_dim)?;
        let multi_head = MultiHeadAttention::from_config(&vb.pp("att"), c, mask)?;
        let norm_2 = LayerNorm::new(&vb.pp("norm_2"), c.emb_dim)?;
        let feed_forward = FeedForward::new(&vb.pp("ff"), c.emb_dim)?;
        Ok(Self {
            norm_1,
            multi_head,
            norm_2,
            feed_forward,
            drop_shortcut: Dropout::new(c.drop_rate),
        })
    }
}

impl ModuleT for TransformerBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let shortcut_1 = xs;
        let x = self.norm_1.forward_t(xs, train)?;
        let x = self.multi_head.forward_t(&x, train)?;
        let x = self.drop_shortcut.forward_t(&x, train)?;
        let x = (x + shortcut_1)?; // shortcut connection

        let shortcut_2 = &x;
        let y = self.norm_2.forward_t(&x, train)?;
        let y = self.feed_forward.forward_t(&y, train)?;
        let y = self.drop_shortcut.forward_t(&y, train)?;

        y + shortcut_2 // shortcut connection
    }
}
