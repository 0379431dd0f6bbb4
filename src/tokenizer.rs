use super::*;

/// Id of `<|endoftext|>` in the GPT-2 vocabulary (its last entry).
pub const END_OF_TEXT: u32 = 50256;

/// GPT-2 byte-pair encoder.
pub struct Tokenizer(CoreBPE);

impl From<CoreBPE> for Tokenizer {
    fn from(value: CoreBPE) -> Self {
        Self(value)
    }
}

impl AsRef<CoreBPE> for Tokenizer {
    fn as_ref(&self) -> &CoreBPE {
        &self.0
    }
}

impl Tokenizer {
    pub fn gpt2() -> eyre::Result<Self> {
        let bpe = get_bpe_from_model("gpt2").map_err(|e| eyre!("{e}"))?;
        Ok(Self(bpe))
    }

    /// Encodes `text`; `<|endoftext|>` is recognised as a special token
    /// (it is the only special token of the GPT-2 vocabulary).
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.0.encode_with_special_tokens(text)
    }

    pub fn decode(&self, ids: &[u32]) -> eyre::Result<String> {
        self.0.decode(ids.to_vec()).map_err(|e| eyre!(e))
    }

    /// Like [`Tokenizer::decode`], but a token sequence that is not valid
    /// UTF-8 (common in sampled text) decodes token by token, each
    /// undecodable token becoming U+FFFD.
    pub fn decode_lossy(&self, ids: &[u32]) -> String {
        match self.0.decode(ids.to_vec()) {
            Ok(text) => text,
            Err(e) => {
                debug!("lossy decode of {} tokens: {e}", ids.len());
                ids.iter()
                    .map(|&id| {
                        self.0
                            .decode(vec![id])
                            .unwrap_or_else(|_| char::REPLACEMENT_CHARACTER.to_string())
                    })
                    .collect()
            }
        }
    }

    /// `(1, num_tokens)` tensor: the leading axis is the batch.
    pub fn text_to_token_ids(&self, text: &str, dev: &Device) -> candle_core::Result<Tensor> {
        let encoded = self.encode(text);
        let num_tokens = encoded.len();
        Tensor::from_vec(encoded, (1_usize, num_tokens), dev)
    }

    pub fn token_ids_to_text(&self, token_ids: &Tensor) -> eyre::Result<String> {
        let flat = token_ids.squeeze(0)?;
        self.decode(&flat.to_vec1::<u32>()?)
    }
}
