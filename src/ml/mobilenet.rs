//! MobileNetV2 バックボーン
//!
//! 分類ヘッドを持たない特徴抽出部分のみ。出力は [batch, 1280, h/32, w/32]。
//!
//! # アーキテクチャ
//! - Stem: Conv 3x3 stride 2 (3 -> 32) + BN + ReLU6
//! - Inverted residual x 17（下表）
//! - Conv 1x1 (320 -> 1280) + BN + ReLU6
//!
//! | 拡張率 t | 出力ch c | 繰り返し n | stride s |
//! |---------|---------|-----------|----------|
//! | 1       | 16      | 1         | 1        |
//! | 6       | 24      | 2         | 2        |
//! | 6       | 32      | 3         | 2        |
//! | 6       | 64      | 4         | 2        |
//! | 6       | 96      | 3         | 1        |
//! | 6       | 160     | 3         | 2        |
//! | 6       | 320     | 1         | 1        |

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// (t, c, n, s)
pub const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// inverted residual ブロックの総数
pub const NUM_BLOCKS: usize = 17;

pub const STEM_CHANNELS: usize = 32;

/// バックボーン出力のチャンネル数
pub const FEATURE_DIM: usize = 1280;

/// Conv + BatchNorm + ReLU6
#[derive(Module, Debug)]
pub struct ConvBnRelu6<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    pub(crate) norm: BatchNorm<B>,
}

impl<B: Backend> ConvBnRelu6<B> {
    fn new(
        channels: [usize; 2],
        kernel: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let padding = kernel / 2;
        Self {
            conv: Conv2dConfig::new(channels, [kernel, kernel])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_groups(groups)
                .with_bias(false)
                .init(device),
            norm: BatchNormConfig::new(channels[1]).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);
        x.clamp(0.0, 6.0)
    }
}

/// Inverted residual ブロック
///
/// 1x1 拡張 → 3x3 depthwise → 1x1 射影（活性化なし）。
/// 入出力の形が一致する（stride 1 かつ同チャンネル）ときだけ残差接続を足す。
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    pub(crate) expand: Option<ConvBnRelu6<B>>,
    pub(crate) depthwise: ConvBnRelu6<B>,
    pub(crate) project: Conv2d<B>,
    pub(crate) project_norm: BatchNorm<B>,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, expansion: usize, device: &B::Device) -> Self {
        let hidden = in_channels * expansion;
        let expand = (expansion != 1).then(|| ConvBnRelu6::new([in_channels, hidden], 1, 1, 1, device));

        Self {
            expand,
            depthwise: ConvBnRelu6::new([hidden, hidden], 3, stride, hidden, device),
            project: Conv2dConfig::new([hidden, out_channels], [1, 1])
                .with_bias(false)
                .init(device),
            project_norm: BatchNormConfig::new(out_channels).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = x.clone();

        let out = match &self.expand {
            Some(expand) => expand.forward(x),
            None => x,
        };
        let out = self.depthwise.forward(out);
        let out = self.project_norm.forward(self.project.forward(out));

        if out.dims() == residual.dims() {
            out + residual
        } else {
            out
        }
    }
}

/// MobileNetV2 特徴抽出器
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    pub(crate) stem: ConvBnRelu6<B>,
    pub(crate) blocks: Vec<InvertedResidual<B>>,
    pub(crate) head_conv: ConvBnRelu6<B>,
}

impl<B: Backend> MobileNetV2<B> {
    /// ランダム初期化で構築（事前学習済み重みは `pretrained::load_backbone_weights` で後から読み込む）
    pub fn new(device: &B::Device) -> Self {
        let stem = ConvBnRelu6::new([3, STEM_CHANNELS], 3, 2, 1, device);

        let mut blocks = Vec::with_capacity(NUM_BLOCKS);
        let mut in_channels = STEM_CHANNELS;
        for (t, c, n, s) in INVERTED_RESIDUAL_SETTINGS {
            for i in 0..n {
                let stride = if i == 0 { s } else { 1 };
                blocks.push(InvertedResidual::new(in_channels, c, stride, t, device));
                in_channels = c;
            }
        }

        let head_conv = ConvBnRelu6::new([in_channels, FEATURE_DIM], 1, 1, 1, device);

        Self { stem, blocks, head_conv }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// 低レベル特徴を保つため、stem と先頭のブロックを凍結する
    ///
    /// 末尾 `trainable_blocks` 個のブロックと head_conv は学習対象のまま。
    pub fn freeze_leading(self, trainable_blocks: usize) -> Self {
        let frozen = self.blocks.len().saturating_sub(trainable_blocks);
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, block)| if i < frozen { block.no_grad() } else { block })
            .collect();

        Self {
            stem: self.stem.no_grad(),
            blocks,
            head_conv: self.head_conv,
        }
    }

    /// # 引数
    /// - `x`: [batch, 3, H, W]
    ///
    /// # 戻り値
    /// - [batch, 1280, H/32, W/32]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.stem.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.head_conv.forward(x)
    }
}
