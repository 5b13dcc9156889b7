//! Building blocks shared by the model zoo.

mod attention;
mod blocks;
mod conv;
mod embedding;
mod feed_forward;
mod prob_attention;
mod recurrent;

pub use attention::{causal_mask, Attention, AttentionConfig, SelfAttention};
pub use blocks::{
    AttentionKind, DecoderLayer, DecoderLayerConfig, EncoderLayer, EncoderLayerConfig,
};
pub use conv::{CausalConv1d, CausalConv1dConfig, DistilConv, DistilConvConfig};
pub use embedding::{positional_encoding, DataEmbedding, DataEmbeddingConfig};
pub use feed_forward::{FeedForwardNetwork, FeedForwardNetworkConfig};
pub use prob_attention::{ProbAttention, ProbAttentionConfig};
pub use recurrent::{CellState, RecurrentCell, RnnEncoder, RnnEncoderConfig, RnnType};
