//! Fill paints for paths

use cinder_core::{Color, Mat4, Point};
use cinder_gpu::Texture2D;

/// A gradient stop, `position` from 0.0 to 1.0
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: Color,
}

impl GradientStop {
    pub fn new(position: f32, color: Color) -> Self {
        Self { position, color }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    Solid(Color),
    LinearGradient {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
    },
    /// Elliptical gradient, `t = 1` on the ellipse with radii `radius_x` and
    /// `radius_y`
    RadialGradient {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        stops: Vec<GradientStop>,
    },
    /// Texture mapped with one texel per brush space unit
    Image(Texture2D),
}

/// Paint plus a brush space transform
///
/// Paint coordinates are in brush space; `transform` maps brush space to the
/// canvas user space the path is drawn in.
#[derive(Clone, Debug, PartialEq)]
pub struct Brush {
    pub paint: Paint,
    pub transform: Mat4,
}

impl Brush {
    pub fn solid(color: Color) -> Self {
        Self {
            paint: Paint::Solid(color),
            transform: Mat4::IDENTITY,
        }
    }

    pub fn linear_gradient(start: Point, end: Point, stops: Vec<GradientStop>) -> Self {
        Self {
            paint: Paint::LinearGradient {
                start,
                end,
                stops: sorted(stops),
            },
            transform: Mat4::IDENTITY,
        }
    }

    pub fn radial_gradient(center: Point, radius: f32, stops: Vec<GradientStop>) -> Self {
        Self::elliptical_gradient(center, radius, radius, stops)
    }

    pub fn elliptical_gradient(
        center: Point,
        radius_x: f32,
        radius_y: f32,
        stops: Vec<GradientStop>,
    ) -> Self {
        Self {
            paint: Paint::RadialGradient {
                center,
                radius_x,
                radius_y,
                stops: sorted(stops),
            },
            transform: Mat4::IDENTITY,
        }
    }

    pub fn image(texture: Texture2D) -> Self {
        Self {
            paint: Paint::Image(texture),
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn stops(&self) -> &[GradientStop] {
        match &self.paint {
            Paint::LinearGradient { stops, .. } | Paint::RadialGradient { stops, .. } => stops,
            Paint::Solid(_) | Paint::Image(_) => &[],
        }
    }

    pub fn image_texture(&self) -> Option<Texture2D> {
        match self.paint {
            Paint::Image(texture) => Some(texture),
            _ => None,
        }
    }
}

impl From<Color> for Brush {
    fn from(color: Color) -> Self {
        Brush::solid(color)
    }
}

fn sorted(mut stops: Vec<GradientStop>) -> Vec<GradientStop> {
    stops.sort_by(|a, b| a.position.total_cmp(&b.position));
    stops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_are_sorted() {
        let brush = Brush::linear_gradient(
            Point::ZERO,
            Point::new(10.0, 0.0),
            vec![
                GradientStop::new(1.0, Color::BLUE),
                GradientStop::new(0.0, Color::RED),
                GradientStop::new(0.5, Color::GREEN),
            ],
        );
        let positions: Vec<f32> = brush.stops().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_solid_from_color() {
        let brush: Brush = Color::RED.into();
        assert_eq!(brush.paint, Paint::Solid(Color::RED));
        assert!(brush.stops().is_empty());
        assert_eq!(brush.image_texture(), None);
    }
}
