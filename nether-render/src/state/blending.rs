//! Blend presets resolved to equations and factors

use crate::device::{BlendEquation, BlendFactor};
use crate::scene::Blending;

/// Fully resolved blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendParams {
    pub equation_rgb: BlendEquation,
    pub equation_alpha: BlendEquation,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendParams {
    const fn add(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }
}

/// Resolve a blend preset. `None` means blending is disabled.
pub fn resolve(blending: Blending, premultiplied_alpha: bool) -> Option<BlendParams> {
    use BlendFactor::*;

    let params = match (blending, premultiplied_alpha) {
        (Blending::None, _) => return None,
        (Blending::Normal, true) => {
            BlendParams::add(One, OneMinusSrcAlpha, One, OneMinusSrcAlpha)
        }
        (Blending::Normal, false) => {
            BlendParams::add(SrcAlpha, OneMinusSrcAlpha, One, OneMinusSrcAlpha)
        }
        (Blending::Additive, true) => BlendParams::add(One, One, One, One),
        (Blending::Additive, false) => BlendParams::add(SrcAlpha, One, SrcAlpha, One),
        (Blending::Subtractive, _) => BlendParams::add(Zero, OneMinusSrcColor, Zero, One),
        (Blending::Multiply, _) => BlendParams::add(Zero, SrcColor, Zero, SrcAlpha),
        (Blending::Custom(custom), _) => BlendParams {
            equation_rgb: custom.equation,
            equation_alpha: custom.equation_alpha.unwrap_or(custom.equation),
            src_rgb: custom.src,
            dst_rgb: custom.dst,
            src_alpha: custom.src_alpha.unwrap_or(custom.src),
            dst_alpha: custom.dst_alpha.unwrap_or(custom.dst),
        },
    };
    Some(params)
}
