//! Per-draw uniform layout shared by the three slot shaders

use crate::material::{Material, MaterialKind};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    /// xy: world to clip scale, zw: offset
    pub view: [f32; 4],
    pub tint: [f32; 4],
    /// Mask channel colors, or the red/green/blue/yellow hue targets
    pub colors: [[f32; 4]; 4],
    /// alpha_test, strength, shade, preserve_dark
    pub params0: [f32; 4],
    /// global_alpha, premultiplied, option a, option b
    pub params1: [f32; 4],
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl DrawUniform {
    pub fn new(material: &Material, tint: [f32; 4], view: [f32; 4]) -> Self {
        match material {
            Material::Basic(m) => Self {
                view,
                tint,
                colors: [[0.0; 4]; 4],
                params0: [m.alpha_test, 1.0, 0.0, 0.0],
                params1: [1.0, flag(m.premultiplied_alpha), 0.0, 0.0],
            },
            Material::MaskRecolor(m) => {
                let o = m.options();
                let c = m.colors();
                Self {
                    view,
                    tint,
                    colors: [c.r.to_array(), c.g.to_array(), c.b.to_array(), c.a.to_array()],
                    params0: [o.alpha_test, o.strength, o.mode.factor(), o.preserve_dark_threshold],
                    params1: [
                        m.global_alpha(),
                        flag(o.premultiplied_alpha),
                        flag(o.debug_mask_view),
                        flag(o.auto_fallback_when_mask_empty),
                    ],
                }
            }
            Material::HueIndexed(m) => {
                let o = m.options();
                let c = m.colors();
                Self {
                    view,
                    tint,
                    colors: [
                        c.red.to_array(),
                        c.green.to_array(),
                        c.blue.to_array(),
                        c.yellow.to_array(),
                    ],
                    params0: [
                        o.alpha_test,
                        o.strength,
                        flag(o.shade_mode),
                        o.preserve_dark_threshold,
                    ],
                    params1: [m.global_alpha(), 1.0, o.sat_min, flag(o.use_yellow)],
                }
            }
        }
    }
}

/// Pipeline selector: material kind plus whether output is premultiplied.
pub fn pipeline_key(material: &Material) -> (MaterialKind, bool) {
    let premultiplied = match material {
        Material::Basic(m) => m.premultiplied_alpha,
        Material::MaskRecolor(m) => m.options().premultiplied_alpha,
        Material::HueIndexed(_) => true,
    };
    (material.kind(), premultiplied)
}
