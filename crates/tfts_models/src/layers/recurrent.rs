//! GRU/LSTM cells and a stacked, optionally bidirectional encoder.

use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{Lstm, LstmConfig, LstmState};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Recurrent cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RnnType {
    /// Gated recurrent unit.
    #[default]
    Gru,
    /// Long short-term memory.
    Lstm,
}

impl std::str::FromStr for RnnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gru" => Ok(Self::Gru),
            "lstm" => Ok(Self::Lstm),
            other => Err(format!("unknown rnn type '{other}', expected gru or lstm")),
        }
    }
}

/// Hidden state carried between steps.
///
/// `cell` is only present for LSTM.
#[derive(Debug, Clone)]
pub struct CellState<B: Backend> {
    /// Hidden state `(B, hidden)`.
    pub hidden: Tensor<B, 2>,
    /// LSTM cell state `(B, hidden)`.
    pub cell: Option<Tensor<B, 2>>,
}

impl<B: Backend> CellState<B> {
    /// Concatenate states along the hidden dimension.
    pub fn cat(states: Vec<Self>) -> Self {
        let cells: Option<Vec<_>> = states.iter().map(|s| s.cell.clone()).collect();
        Self {
            hidden: Tensor::cat(states.into_iter().map(|s| s.hidden).collect(), 1),
            cell: cells.map(|c| Tensor::cat(c, 1)),
        }
    }
}

/// A single GRU or LSTM layer with sequence and single-step entry points.
#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    gru: Option<Gru<B>>,
    lstm: Option<Lstm<B>>,
    hidden_size: usize,
}

impl<B: Backend> RecurrentCell<B> {
    /// Create a cell mapping `d_input` features to `hidden_size`.
    pub fn new(rnn_type: RnnType, d_input: usize, hidden_size: usize, device: &B::Device) -> Self {
        let (gru, lstm) = match rnn_type {
            RnnType::Gru => (Some(GruConfig::new(d_input, hidden_size, true).init(device)), None),
            RnnType::Lstm => (None, Some(LstmConfig::new(d_input, hidden_size, true).init(device))),
        };
        Self {
            gru,
            lstm,
            hidden_size,
        }
    }

    /// Hidden width.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run over `(B, L, D)` returning all hidden states `(B, L, hidden)` and the last state.
    pub fn forward(&self, x: Tensor<B, 3>, state: Option<CellState<B>>) -> (Tensor<B, 3>, CellState<B>) {
        let [batch, seq_len, _] = x.dims();

        if let Some(lstm) = &self.lstm {
            let init = state.map(|s| {
                let cell = s.cell.unwrap_or_else(|| s.hidden.zeros_like());
                LstmState::new(cell, s.hidden)
            });
            let (output, last) = lstm.forward(x, init);
            return (
                output,
                CellState {
                    hidden: last.hidden,
                    cell: Some(last.cell),
                },
            );
        }

        let device = x.device();
        let Some(gru) = &self.gru else {
            let hidden = Tensor::zeros([batch, self.hidden_size], &device);
            return (
                Tensor::zeros([batch, seq_len, self.hidden_size], &device),
                CellState { hidden, cell: None },
            );
        };

        // Gru::forward does not carry state across timesteps; thread it here.
        let d_input = x.dims()[2];
        let mut hidden = state
            .map(|s| s.hidden)
            .unwrap_or_else(|| Tensor::zeros([batch, self.hidden_size], &device));
        let mut outputs = Vec::with_capacity(seq_len);
        for t in 0..seq_len {
            let xt = x.clone().slice([0..batch, t..t + 1, 0..d_input]);
            let out = gru.forward(xt, Some(hidden.unsqueeze_dim(1)));
            hidden = out.clone().reshape([batch, self.hidden_size]);
            outputs.push(out);
        }
        (Tensor::cat(outputs, 1), CellState { hidden, cell: None })
    }

    /// Advance one step with input `(B, D)`.
    pub fn step(&self, x: Tensor<B, 2>, state: Option<CellState<B>>) -> CellState<B> {
        self.forward(x.unsqueeze_dim(1), state).1
    }
}

/// Configuration for [`RnnEncoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RnnEncoderConfig {
    /// Cell type.
    pub rnn_type: RnnType,
    /// Input features.
    pub d_input: usize,
    /// Hidden width per direction.
    pub hidden_size: usize,
    /// Number of stacked layers.
    pub num_layers: usize,
    /// Also run every layer over the time-reversed sequence.
    pub bidirectional: bool,
}

impl RnnEncoderConfig {
    /// Create a single-layer unidirectional config.
    pub fn new(rnn_type: RnnType, d_input: usize, hidden_size: usize) -> Self {
        Self {
            rnn_type,
            d_input,
            hidden_size,
            num_layers: 1,
            bidirectional: false,
        }
    }

    /// Set the number of stacked layers.
    #[must_use]
    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    /// Enable the reverse direction.
    #[must_use]
    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    /// Width of the encoder outputs and final state.
    pub fn output_size(&self) -> usize {
        if self.bidirectional {
            2 * self.hidden_size
        } else {
            self.hidden_size
        }
    }

    /// Initialize the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnEncoder<B> {
        let layers = self.num_layers.max(1);
        let input_size = |i: usize| if i == 0 { self.d_input } else { self.output_size() };

        let cells = (0..layers)
            .map(|i| RecurrentCell::new(self.rnn_type, input_size(i), self.hidden_size, device))
            .collect();
        let reverse_cells = if self.bidirectional {
            (0..layers)
                .map(|i| RecurrentCell::new(self.rnn_type, input_size(i), self.hidden_size, device))
                .collect()
        } else {
            Vec::new()
        };

        RnnEncoder {
            cells,
            reverse_cells,
        }
    }
}

/// Stacked recurrent encoder.
#[derive(Module, Debug)]
pub struct RnnEncoder<B: Backend> {
    cells: Vec<RecurrentCell<B>>,
    reverse_cells: Vec<RecurrentCell<B>>,
}

impl<B: Backend> RnnEncoder<B> {
    /// Encode `(B, L, D)`.
    ///
    /// Returns the last layer's outputs `(B, L, out)` and its final state,
    /// the two directions concatenated when bidirectional.
    pub fn forward(&self, x: Tensor<B, 3>) -> (Tensor<B, 3>, CellState<B>) {
        let mut input = x;
        let mut last_state = None;

        for (i, cell) in self.cells.iter().enumerate() {
            let (fwd_out, fwd_state) = cell.forward(input.clone(), None);
            match self.reverse_cells.get(i) {
                Some(reverse) => {
                    let (bwd_out, bwd_state) = reverse.forward(input.flip([1]), None);
                    input = Tensor::cat(vec![fwd_out, bwd_out.flip([1])], 2);
                    last_state = Some(CellState::cat(vec![fwd_state, bwd_state]));
                }
                None => {
                    input = fwd_out;
                    last_state = Some(fwd_state);
                }
            }
        }

        let state = last_state.unwrap_or_else(|| {
            let [batch, seq_len, width] = input.dims();
            CellState {
                hidden: input
                    .clone()
                    .slice([0..batch, seq_len - 1..seq_len, 0..width])
                    .reshape([batch, width]),
                cell: None,
            }
        });
        (input, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_rnn_type_parse() {
        assert_eq!("GRU".parse::<RnnType>().unwrap(), RnnType::Gru);
        assert_eq!("lstm".parse::<RnnType>().unwrap(), RnnType::Lstm);
        assert!("rnn".parse::<RnnType>().is_err());
        assert_eq!(serde_json::to_string(&RnnType::Lstm).unwrap(), "\"lstm\"");
    }

    #[test]
    fn test_cell_step_matches_sequence() {
        let device = Default::default();
        for rnn_type in [RnnType::Gru, RnnType::Lstm] {
            let cell = RecurrentCell::<TestBackend>::new(rnn_type, 3, 8, &device);
            let x = Tensor::random([2, 4, 3], Distribution::Normal(0.0, 1.0), &device);
            let (out, last) = cell.forward(x.clone(), None);
            assert_eq!(out.dims(), [2, 4, 8]);

            let mut state = None;
            for t in 0..4 {
                let xt = x.clone().slice([0..2, t..t + 1, 0..3]).reshape([2, 3]);
                state = Some(cell.step(xt, state));
            }
            let stepped: Vec<f32> = state.unwrap().hidden.into_data().to_vec().unwrap();
            let full: Vec<f32> = last.hidden.into_data().to_vec().unwrap();
            for (a, b) in stepped.iter().zip(full.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_final_state_depends_on_first_input() {
        let device = Default::default();
        for rnn_type in [RnnType::Gru, RnnType::Lstm] {
            let encoder = RnnEncoderConfig::new(rnn_type, 1, 8).init::<TestBackend>(&device);
            let a = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 1.0], &device).reshape([1, 3, 1]);
            let b = Tensor::<TestBackend, 1>::from_floats([9.0, 1.0, 1.0], &device).reshape([1, 3, 1]);

            let (_, state_a) = encoder.forward(a);
            let (_, state_b) = encoder.forward(b);
            let diff: f32 = (state_a.hidden - state_b.hidden).abs().sum().into_scalar();
            assert!(diff > 1e-4, "{rnn_type:?} final state ignores the first input");
        }
    }

    #[test]
    fn test_bidirectional_stacked_encoder() {
        let device = Default::default();
        let encoder = RnnEncoderConfig::new(RnnType::Lstm, 2, 6)
            .with_num_layers(2)
            .with_bidirectional(true)
            .init::<TestBackend>(&device);
        let x = Tensor::random([3, 10, 2], Distribution::Normal(0.0, 1.0), &device);

        let (out, state) = encoder.forward(x);
        assert_eq!(out.dims(), [3, 10, 12]);
        assert_eq!(state.hidden.dims(), [3, 12]);
        assert_eq!(state.cell.unwrap().dims(), [3, 12]);
    }
}
