//! Effect stages and their parameters.
//!
//! A stage's parameters are drawn once, when the stage is built, from a
//! `StdRng` seeded with the stage seed. Two stages built from the same kind
//! and seed are identical.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uniquify_common::{UniqError, UniqResult};

/// Speed factor bounds for temporal stages.
pub const SPEED_RANGE: (f64, f64) = (0.95, 1.05);
/// Maximum fraction trimmed from each end of the clip.
pub const MAX_TRIM_FRAC: f64 = 0.05;
/// Additive brightness bounds (8-bit levels).
pub const BRIGHTNESS_RANGE: (i32, i32) = (-15, 15);
pub const CONTRAST_RANGE: (f64, f64) = (0.9, 1.1);
pub const SATURATION_RANGE: (f64, f64) = (0.9, 1.1);

/// The four families of transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Temporal,
    Visual,
    Social,
    Neural,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Temporal,
        EffectKind::Visual,
        EffectKind::Social,
        EffectKind::Neural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Temporal => "temporal",
            EffectKind::Visual => "visual",
            EffectKind::Social => "social",
            EffectKind::Neural => "neural",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = UniqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temporal" => Ok(EffectKind::Temporal),
            "visual" => Ok(EffectKind::Visual),
            "social" => Ok(EffectKind::Social),
            "neural" => Ok(EffectKind::Neural),
            other => Err(UniqError::pipeline(format!(
                "unknown effect '{other}' (expected temporal, visual, social or neural)"
            ))),
        }
    }
}

/// Social-media look applied by a social stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialStyle {
    Vintage,
    Dramatic,
    Soft,
    Vibrant,
}

impl SocialStyle {
    pub const ALL: [SocialStyle; 4] = [
        SocialStyle::Vintage,
        SocialStyle::Dramatic,
        SocialStyle::Soft,
        SocialStyle::Vibrant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialStyle::Vintage => "vintage",
            SocialStyle::Dramatic => "dramatic",
            SocialStyle::Soft => "soft",
            SocialStyle::Vibrant => "vibrant",
        }
    }
}

impl fmt::Display for SocialStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocialStyle {
    type Err = UniqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SocialStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UniqError::pipeline(format!("unknown social style '{s}'")))
    }
}

/// Speed change with independent head/tail trims.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalParams {
    /// Playback speed factor; output duration is the trimmed duration / speed.
    pub speed: f64,

    /// Fraction of the source duration removed from the start.
    pub trim_start_frac: f64,

    /// Fraction of the source duration removed from the end.
    pub trim_end_frac: f64,
}

/// Whole-frame colour adjustment plus faint luma noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualParams {
    /// Additive brightness in 8-bit levels.
    pub brightness: i32,
    pub contrast: f64,
    pub saturation: f64,
    /// Standard deviation of the additive Gaussian noise.
    pub noise_sigma: f64,
}

/// Fixed parameter bundle for each social style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum SocialParams {
    Vintage {
        warmth: f64,
        vignette: f64,
        grain: f64,
    },
    Dramatic {
        contrast: f64,
        shadows: f64,
        highlights: f64,
    },
    Soft {
        blur: f64,
        brightness: i32,
        saturation: f64,
    },
    Vibrant {
        saturation: f64,
        vibrance: f64,
        clarity: f64,
    },
}

impl SocialParams {
    pub fn for_style(style: SocialStyle) -> Self {
        match style {
            SocialStyle::Vintage => SocialParams::Vintage {
                warmth: 0.9,
                vignette: 0.2,
                grain: 0.1,
            },
            SocialStyle::Dramatic => SocialParams::Dramatic {
                contrast: 1.15,
                shadows: 0.8,
                highlights: 1.2,
            },
            SocialStyle::Soft => SocialParams::Soft {
                blur: 0.5,
                brightness: 5,
                saturation: 0.9,
            },
            SocialStyle::Vibrant => SocialParams::Vibrant {
                saturation: 1.2,
                vibrance: 1.15,
                clarity: 1.1,
            },
        }
    }

    pub fn style(&self) -> SocialStyle {
        match self {
            SocialParams::Vintage { .. } => SocialStyle::Vintage,
            SocialParams::Dramatic { .. } => SocialStyle::Dramatic,
            SocialParams::Soft { .. } => SocialStyle::Soft,
            SocialParams::Vibrant { .. } => SocialStyle::Vibrant,
        }
    }
}

/// Ranges the neural stage re-samples on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuralParams {
    pub gamma_min: f64,
    pub gamma_max: f64,
    /// Per-channel shift is drawn from `[-shift, shift]` (unit range).
    pub shift: f64,
    /// Chance that a frame gets a 3x3 or 5x5 box blur.
    pub blur_probability: f64,
}

impl Default for NeuralParams {
    fn default() -> Self {
        Self {
            gamma_min: 0.9,
            gamma_max: 1.1,
            shift: 0.05,
            blur_probability: 0.3,
        }
    }
}

/// Parameters of one stage, one variant per [`EffectKind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageParams {
    Temporal(TemporalParams),
    Visual(VisualParams),
    Social(SocialParams),
    Neural(NeuralParams),
}

impl StageParams {
    pub fn kind(&self) -> EffectKind {
        match self {
            StageParams::Temporal(_) => EffectKind::Temporal,
            StageParams::Visual(_) => EffectKind::Visual,
            StageParams::Social(_) => EffectKind::Social,
            StageParams::Neural(_) => EffectKind::Neural,
        }
    }

    /// Draw parameters for `kind` from the documented ranges.
    pub fn sample(kind: EffectKind, rng: &mut StdRng) -> Self {
        match kind {
            EffectKind::Temporal => StageParams::Temporal(TemporalParams {
                speed: rng.gen_range(SPEED_RANGE.0..=SPEED_RANGE.1),
                trim_start_frac: rng.gen_range(0.0..=MAX_TRIM_FRAC),
                trim_end_frac: rng.gen_range(0.0..=MAX_TRIM_FRAC),
            }),
            EffectKind::Visual => StageParams::Visual(VisualParams {
                brightness: rng.gen_range(BRIGHTNESS_RANGE.0..=BRIGHTNESS_RANGE.1),
                contrast: rng.gen_range(CONTRAST_RANGE.0..=CONTRAST_RANGE.1),
                saturation: rng.gen_range(SATURATION_RANGE.0..=SATURATION_RANGE.1),
                noise_sigma: 1.0,
            }),
            EffectKind::Social => {
                let style = SocialStyle::ALL[rng.gen_range(0..SocialStyle::ALL.len())];
                StageParams::Social(SocialParams::for_style(style))
            }
            EffectKind::Neural => StageParams::Neural(NeuralParams::default()),
        }
    }
}

/// One transformation step: a kind, its sampled parameters, and the seed that
/// produced them (also used for per-frame randomness).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectStage {
    pub kind: EffectKind,
    pub seed: u64,
    pub params: StageParams,
}

impl EffectStage {
    /// Build a stage with parameters sampled from `seed`.
    pub fn sample(kind: EffectKind, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            kind,
            seed,
            params: StageParams::sample(kind, &mut rng),
        }
    }

    /// Build a stage with explicit parameters.
    pub fn with_params(params: StageParams, seed: u64) -> Self {
        Self {
            kind: params.kind(),
            seed,
            params,
        }
    }

    /// Name used in logs, errors and metadata.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Short human-readable parameter summary.
    pub fn describe(&self) -> String {
        match &self.params {
            StageParams::Temporal(p) => format!(
                "speed={:.3} trim_start={:.3} trim_end={:.3}",
                p.speed, p.trim_start_frac, p.trim_end_frac
            ),
            StageParams::Visual(p) => format!(
                "brightness={} contrast={:.3} saturation={:.3}",
                p.brightness, p.contrast, p.saturation
            ),
            StageParams::Social(p) => format!("style={}", p.style()),
            StageParams::Neural(p) => format!(
                "gamma=[{:.2},{:.2}] shift={:.2} blur_p={:.2}",
                p.gamma_min, p.gamma_max, p.shift, p.blur_probability
            ),
        }
    }
}

/// Derive a child seed from a parent seed and a salt (stage index, version
/// number, frame index). SplitMix64 finalizer.
pub fn derive_seed(parent: u64, salt: u64) -> u64 {
    let mut z = parent ^ salt.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Parse a comma/space separated effect list (`"temporal,social"`).
pub fn parse_kinds(list: &str) -> UniqResult<Vec<EffectKind>> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}
