use super::*;

/// GELU, tanh approximation:
/// `0.5 * x * (1 + tanh(sqrt(2 / pi) * (x + 0.044715 * x^3)))`
///
/// A unit struct in order to implement `candle_nn::ModuleT`
#[derive(Clone, Debug)]
pub struct GELU;

impl ModuleT for GELU {
    fn forward_t(&self, xs: &Tensor, _: bool) -> candle_core::Result<Tensor> {
        let cubic = xs.sqr()?.mul(xs)?.affine(0.044715, 0.)?;
        let inner = xs.add(&cubic)?.affine((2. / PI).sqrt(), 0.)?;
        // 0.5 * (1 + tanh(inner))
        let gate = inner.tanh()?.affine(0.5, 0.5)?;
        xs.mul(&gate)
    }
}

/// Position-wise expand (x4) / GELU / project back.
pub struct FeedForward {
    linear_1: Linear,
    gelu: GELU,
    linear_2: Linear,
}

impl FeedForward {
    pub fn new(vb: &VarBuilder, emb_dim: usize) -> candle_core::Result<Self> {
        let linear_1 = linear_b(emb_dim, 4 * emb_dim, true, vb.pp("c_fc"))?;
        let linear_2 = linear_b(4 * emb_dim, emb_dim, true, vb.pp("c_proj"))?;
        Ok(Self {
            linear_1,
            gelu: GELU,
            linear_2,
        })
    }

    pub fn hidden_dim(&self) -> usize {
        self.linear_1.weight().dims()[0]
    }
}

impl ModuleT for FeedForward {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let xs = self.linear_1.forward_t(xs, train)?;
        let xs = self.gelu.forward_t(&xs, train)?;
        self.linear_2.forward_t(&xs, train)
    }
}
