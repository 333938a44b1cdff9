//! Standard program interpretation and blending

use cinder_core::Color;

use crate::description::{BlendEquation, BlendFunc, BlendStateDescription, ColorWriteMask};
use crate::pixel_buffer::PixelBuffer;
use crate::program::{color_only, path, path_instance, single, sprite, StandardProgram};

/// Attribute values of a fragment, locations 0 to 3
pub(super) type Varyings = [[f32; 4]; 4];

pub(super) fn interpolate(values: &[&Varyings], weights: &[f32]) -> Varyings {
    let mut out = [[0.0f32; 4]; 4];
    for (value, &weight) in values.iter().zip(weights) {
        for (slot, attribute) in out.iter_mut().zip(value.iter()) {
            for (o, a) in slot.iter_mut().zip(attribute) {
                *o += a * weight;
            }
        }
    }
    out
}

fn mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

/// Nearest sampling at normalized coordinates, `v = 0` is row 0
pub(super) fn sample_nearest(texture: &PixelBuffer, u: f32, v: f32) -> [f32; 4] {
    if texture.width() == 0 || texture.height() == 0 {
        return [0.0; 4];
    }
    let x = ((u * texture.width() as f32).floor() as i32).clamp(0, texture.width() - 1);
    let y = ((v * texture.height() as f32).floor() as i32).clamp(0, texture.height() - 1);
    texture.pixel(x, y)
}

fn texel(texture: &PixelBuffer, x: i32, y: i32) -> [f32; 4] {
    if texture.bounds().contains(x, y) {
        texture.pixel(x, y)
    } else {
        [0.0; 4]
    }
}

/// Run `program` for one fragment; `None` discards it
///
/// An unbound texture unit samples as opaque white.
pub(super) fn shade<'a>(
    program: StandardProgram,
    varyings: &Varyings,
    texture_unit: impl Fn(usize) -> Option<&'a PixelBuffer>,
) -> Option<[f32; 4]> {
    let sample = |unit: usize, u: f32, v: f32| {
        texture_unit(unit)
            .map(|texture| sample_nearest(texture, u, v))
            .unwrap_or([1.0; 4])
    };
    match program {
        StandardProgram::ColorOnly => Some(varyings[color_only::ATTR_COLOR]),
        StandardProgram::Single => {
            let uv = varyings[single::ATTR_TEXCOORD];
            let color = varyings[single::ATTR_COLOR];
            Some(mul(color, sample(single::TEXTURE_UNIT, uv[0], uv[1])))
        }
        StandardProgram::Sprite => {
            let color = varyings[sprite::ATTR_COLOR];
            let index = varyings[sprite::ATTR_TEXINDEX][0];
            if index < 0.0 {
                return Some(color);
            }
            let unit = (index.round() as usize).min(sprite::MAX_TEXTURE_UNITS - 1);
            let uv = varyings[sprite::ATTR_TEXCOORD];
            Some(mul(color, sample(unit, uv[0], uv[1])))
        }
        StandardProgram::Path => shade_path(varyings, &texture_unit),
    }
}

fn shade_path<'a>(
    varyings: &Varyings,
    texture_unit: &impl Fn(usize) -> Option<&'a PixelBuffer>,
) -> Option<[f32; 4]> {
    let mask_pos = varyings[path::ATTR_MASK_POSITION];
    let mask = texture_unit(path::MASK_UNIT)?;
    let coverage = texel(mask, mask_pos[0].floor() as i32, mask_pos[1].floor() as i32)[0];
    if coverage <= 0.0 {
        return None;
    }

    let instances = texture_unit(path::INSTANCE_UNIT)?;
    let width = instances.width().max(1) as usize;
    let base = varyings[path::ATTR_INSTANCE_OFFSET][0].round().max(0.0) as usize;
    let fetch = |index: usize| {
        let offset = base + index;
        texel(instances, (offset % width) as i32, (offset / width) as i32)
    };

    let header = fetch(0);
    let [a, b, c, d] = fetch(1);
    let translation = fetch(2);
    let params = fetch(3);
    let device = varyings[path::ATTR_DEVICE_POSITION];
    let x = a * device[0] + c * device[1] + translation[0];
    let y = b * device[0] + d * device[1] + translation[1];

    let stop_count = (header[1].max(0.0) as usize).min(path_instance::MAX_STOPS);
    let gradient = |t: f32| -> [f32; 4] {
        let stop = |i: usize| {
            let texel = path_instance::HEADER_TEXELS + i * path_instance::TEXELS_PER_STOP;
            (fetch(texel), fetch(texel + 1)[0])
        };
        if stop_count == 0 {
            return [0.0; 4];
        }
        let (first_color, first_pos) = stop(0);
        if t <= first_pos {
            return first_color;
        }
        for i in 1..stop_count {
            let (color, pos) = stop(i);
            let (prev_color, prev_pos) = stop(i - 1);
            if t <= pos {
                let span = pos - prev_pos;
                let f = if span > 0.0 { (t - prev_pos) / span } else { 1.0 };
                return Color::from_array(prev_color)
                    .lerp(&Color::from_array(color), f)
                    .to_array();
            }
        }
        stop(stop_count - 1).0
    };

    let paint = if header[0] == path_instance::TYPE_SOLID {
        params
    } else if header[0] == path_instance::TYPE_LINEAR {
        let (dx, dy) = (params[2] - params[0], params[3] - params[1]);
        let length_sq = dx * dx + dy * dy;
        let t = if length_sq > 0.0 {
            ((x - params[0]) * dx + (y - params[1]) * dy) / length_sq
        } else {
            0.0
        };
        gradient(t)
    } else if header[0] == path_instance::TYPE_RADIAL {
        let rx = if params[2] != 0.0 { (x - params[0]) / params[2] } else { 0.0 };
        let ry = if params[3] != 0.0 { (y - params[1]) / params[3] } else { 0.0 };
        gradient((rx * rx + ry * ry).sqrt())
    } else {
        let image = texture_unit(path::IMAGE_UNIT)?;
        sample_nearest(image, x * params[0], y * params[1])
    };

    Some([paint[0], paint[1], paint[2], paint[3] * coverage])
}

/// Blend factor for `channel`, 3 being alpha
fn factor(func: BlendFunc, src: &[f32; 4], dst: &[f32; 4], constant: &[f32; 4], channel: usize) -> f32 {
    match func {
        BlendFunc::Zero => 0.0,
        BlendFunc::One => 1.0,
        BlendFunc::SrcColor => src[channel],
        BlendFunc::OneMinusSrcColor => 1.0 - src[channel],
        BlendFunc::DestColor => dst[channel],
        BlendFunc::OneMinusDestColor => 1.0 - dst[channel],
        BlendFunc::SrcAlpha => src[3],
        BlendFunc::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFunc::DestAlpha => dst[3],
        BlendFunc::OneMinusDestAlpha => 1.0 - dst[3],
        BlendFunc::ConstantColor => constant[channel],
        BlendFunc::OneMinusConstantColor => 1.0 - constant[channel],
        BlendFunc::ConstantAlpha => constant[3],
        BlendFunc::OneMinusConstantAlpha => 1.0 - constant[3],
        BlendFunc::SrcAlphaSaturate if channel == 3 => 1.0,
        BlendFunc::SrcAlphaSaturate => src[3].min(1.0 - dst[3]),
    }
}

fn combine(equation: BlendEquation, s: f32, fs: f32, d: f32, fd: f32) -> f32 {
    match equation {
        BlendEquation::Add => s * fs + d * fd,
        BlendEquation::Subtract => s * fs - d * fd,
        BlendEquation::ReverseSubtract => d * fd - s * fs,
        BlendEquation::Min => s.min(d),
        BlendEquation::Max => s.max(d),
    }
}

/// Combine `src` with the destination pixel and apply the write mask
pub(super) fn blend(
    description: &BlendStateDescription,
    constant: Color,
    src: [f32; 4],
    dst: [f32; 4],
) -> [f32; 4] {
    let mut out = if description.enabled {
        let constant = constant.to_array();
        let mut out = [0.0f32; 4];
        for (channel, value) in out.iter_mut().enumerate() {
            let (src_func, dest_func, equation) = if channel == 3 {
                (description.src_alpha, description.dest_alpha, description.alpha_equation)
            } else {
                (description.src, description.dest, description.color_equation)
            };
            let fs = factor(src_func, &src, &dst, &constant, channel);
            let fd = factor(dest_func, &src, &dst, &constant, channel);
            *value = combine(equation, src[channel], fs, dst[channel], fd);
        }
        out
    } else {
        src
    };
    apply_write_mask(&description.color_write, &mut out, dst);
    out
}

fn apply_write_mask(mask: &ColorWriteMask, out: &mut [f32; 4], dst: [f32; 4]) {
    let enabled = [mask.red, mask.green, mask.blue, mask.alpha];
    for channel in 0..4 {
        if !enabled[channel] {
            out[channel] = dst[channel];
        }
    }
}
