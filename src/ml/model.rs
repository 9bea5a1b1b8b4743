use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::error::PipelineError;
use crate::domain::labels::LabelHead;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct GraphemeCnnConfig {
    #[config(default = 68)]
    pub input_height: usize,
    #[config(default = 118)]
    pub input_width:  usize,
    #[config(default = 3)]
    pub conv_blocks:  usize,
    #[config(default = 64)]
    pub conv_filters: usize,
    #[config(default = 3)]
    pub kernel_size:  usize,
    #[config(default = 2)]
    pub pool_size:    usize,
    #[config(default = 0.3)]
    pub conv_dropout: f64,
    #[config(default = 1024)]
    pub dense1:       usize,
    #[config(default = 0.3)]
    pub dense_dropout: f64,
    #[config(default = 512)]
    pub dense2:       usize,
}

impl GraphemeCnnConfig {
    /// Width of the flattened feature map after the last pooling block.
    ///
    /// Convolutions use same padding, so only pooling shrinks the map.
    pub fn flattened_features(&self) -> Result<usize, PipelineError> {
        if self.conv_blocks == 0 || self.conv_filters == 0 || self.kernel_size == 0 {
            return Err(PipelineError::Validation(
                "conv_blocks, conv_filters and kernel_size must be positive".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(PipelineError::Validation("pool_size must be positive".to_string()));
        }

        let (mut h, mut w) = (self.input_height, self.input_width);
        for block in 0..self.conv_blocks {
            h /= self.pool_size;
            w /= self.pool_size;
            if h == 0 || w == 0 {
                return Err(PipelineError::Validation(format!(
                    "pooling block {} collapses a {}x{} input with pool size {}",
                    block + 1,
                    self.input_height,
                    self.input_width,
                    self.pool_size
                )));
            }
        }
        Ok(h * w * self.conv_filters)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<GraphemeCnn<B>, PipelineError> {
        let flattened = self.flattened_features()?;
        for (name, p) in [("conv_dropout", self.conv_dropout), ("dense_dropout", self.dense_dropout)] {
            if !(0.0..1.0).contains(&p) {
                return Err(PipelineError::Validation(format!("{name} {p} must be in [0, 1)")));
            }
        }

        let convs = (0..self.conv_blocks)
            .map(|i| {
                let channels_in = if i == 0 { 1 } else { self.conv_filters };
                Conv2dConfig::new(
                    [channels_in, self.conv_filters],
                    [self.kernel_size, self.kernel_size],
                )
                .with_padding(PaddingConfig2d::Same)
                .init(device)
            })
            .collect();

        let pool = MaxPool2dConfig::new([self.pool_size, self.pool_size])
            .with_strides([self.pool_size, self.pool_size])
            .init();

        Ok(GraphemeCnn {
            convs,
            pool,
            conv_dropout:  DropoutConfig::new(self.conv_dropout).init(),
            dense1:        LinearConfig::new(flattened, self.dense1).init(device),
            dense_dropout: DropoutConfig::new(self.dense_dropout).init(),
            dense2:        LinearConfig::new(self.dense1, self.dense2).init(device),
            root_head:      LinearConfig::new(self.dense2, LabelHead::Root.num_classes()).init(device),
            vowel_head:     LinearConfig::new(self.dense2, LabelHead::Vowel.num_classes()).init(device),
            consonant_head: LinearConfig::new(self.dense2, LabelHead::Consonant.num_classes()).init(device),
            input_height: self.input_height,
            input_width:  self.input_width,
        })
    }
}

/// Conv/pool feature extractor with one classification head per label.
#[derive(Module, Debug)]
pub struct GraphemeCnn<B: Backend> {
    pub convs:          Vec<Conv2d<B>>,
    pub pool:           MaxPool2d,
    pub conv_dropout:   Dropout,
    pub dense1:         Linear<B>,
    pub dense_dropout:  Dropout,
    pub dense2:         Linear<B>,
    pub root_head:      Linear<B>,
    pub vowel_head:     Linear<B>,
    pub consonant_head: Linear<B>,
    pub input_height:   usize,
    pub input_width:    usize,
}

/// Unnormalised scores of each head, shape [batch, classes].
pub struct HeadLogits<B: Backend> {
    pub root:      Tensor<B, 2>,
    pub vowel:     Tensor<B, 2>,
    pub consonant: Tensor<B, 2>,
}

impl<B: Backend> HeadLogits<B> {
    pub fn get(&self, head: LabelHead) -> &Tensor<B, 2> {
        match head {
            LabelHead::Root      => &self.root,
            LabelHead::Vowel     => &self.vowel,
            LabelHead::Consonant => &self.consonant,
        }
    }

    /// Logits in `LabelHead::ALL` order.
    pub fn into_vec(self) -> Vec<Tensor<B, 2>> {
        vec![self.root, self.vowel, self.consonant]
    }
}

impl<B: Backend> GraphemeCnn<B> {
    /// images: [batch, 1, height, width]
    pub fn forward(&self, images: Tensor<B, 4>) -> HeadLogits<B> {
        let mut x = images;
        for conv in &self.convs {
            x = self.pool.forward(relu(conv.forward(x)));
        }
        let x = self.conv_dropout.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = relu(self.dense1.forward(x));
        let x = self.dense_dropout.forward(x);
        let x = relu(self.dense2.forward(x));

        HeadLogits {
            root:      self.root_head.forward(x.clone()),
            vowel:     self.vowel_head.forward(x.clone()),
            consonant: self.consonant_head.forward(x),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_flattened_features_default() {
        // 68x118 → 34x59 → 17x29 → 8x14, times 64 filters
        assert_eq!(GraphemeCnnConfig::new().flattened_features().unwrap(), 8 * 14 * 64);
    }

    #[test]
    fn test_collapsing_geometry_rejected() {
        let cfg = GraphemeCnnConfig::new().with_pool_size(5);
        // 68 → 13 → 2 → 0
        assert!(matches!(cfg.flattened_features(), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_forward_head_shapes() {
        let device = Default::default();
        let cfg = GraphemeCnnConfig::new()
            .with_input_height(8)
            .with_input_width(12)
            .with_conv_blocks(2)
            .with_conv_filters(4)
            .with_dense1(16)
            .with_dense2(8);
        let model: GraphemeCnn<TestBackend> = cfg.init(&device).unwrap();

        let images = Tensor::<TestBackend, 4>::zeros([3, 1, 8, 12], &device);
        let logits = model.forward(images);
        assert_eq!(logits.root.dims(), [3, 168]);
        assert_eq!(logits.vowel.dims(), [3, 11]);
        assert_eq!(logits.consonant.dims(), [3, 7]);
    }

    #[test]
    fn test_bad_dropout_rejected() {
        let device = Default::default();
        let cfg = GraphemeCnnConfig::new().with_dense_dropout(1.5);
        assert!(cfg.init::<TestBackend>(&device).is_err());
    }
}
