use candle_core::{D, DType, Device, IndexOp, Tensor};
use candle_nn::ops::softmax;
use candle_nn::{
    Dropout, Embedding, Init, Linear, ModuleT, Optimizer, VarBuilder, embedding, linear_b,
};

use eyre::{WrapErr, ensure, eyre};
use log::{debug, info};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::{fs, path::Path};
use tiktoken_rs::{CoreBPE, get_bpe_from_model};

mod error;
pub use error::*;

mod tokenizer;
pub use tokenizer::*;

mod transformer;
pub use transformer::*;

mod data;
pub use data::*;

mod gpt;
pub use gpt::*;

mod custom_norm;
pub use custom_norm::*;

pub mod cli;
