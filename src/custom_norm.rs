use super::*;

pub const LAYER_NORM_EPS: f64 = 1e-5;

// Standardizes every token vector over its features (z-scores), then maps it
// through a learnt scale and shift.
// Both parameters start at 1: shift is *not* initialised to 0.
pub struct LayerNorm {
    pub scale: Tensor,
    pub shift: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn new(vb: &VarBuilder, emb_dim: usize) -> candle_core::Result<Self> {
        let scale = vb.get_with_hints(emb_dim, "scale", Init::Const(1.))?;
        let shift = vb.get_with_hints(emb_dim, "shift", Init::Const(1.))?;
        Ok(Self::from_params(scale, shift))
    }

    pub fn from_params(scale: Tensor, shift: Tensor) -> Self {
        Self {
            scale,
            shift,
            eps: LAYER_NORM_EPS,
        }
    }
}

impl ModuleT for LayerNorm {
    fn forward_t(&self, xs: &Tensor, _: bool) -> candle_core::Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        // population variance: divide by the feature count, not count - 1
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let std = var.affine(1., self.eps)?.sqrt()?;
        let normed = centered.broadcast_div(&std)?;
        normed
            .broadcast_mul(&self.scale)?
            .broadcast_add(&self.shift)
    }
}
