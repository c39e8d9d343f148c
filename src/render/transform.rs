// SPDX-License-Identifier: GPL-3.0-only

//! 2-D affine transforms between camera image space and view space

use crate::backends::camera::{Orientation, ViewportSize};

/// Affine transform `(x, y) -> (a·x + c·y + tx, b·x + d·y + ty)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// Transform that applies `self` first, then `next`
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    /// Inverse transform, or `None` when the matrix is singular
    pub fn inverted(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if !det.is_finite() || det.abs() <= f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Affine {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }

    /// Columns of the 3×3 matrix as laid out in the uniform buffer
    ///
    /// The shader multiplies a row vector `(x, y, 1)` by this matrix, so the
    /// columns hold the rows of the conventional affine matrix. Each column
    /// is padded to 16 bytes.
    pub fn to_uniform_columns(&self) -> [[f32; 4]; 3] {
        [
            [self.a, self.c, self.tx, 0.0],
            [self.b, self.d, self.ty, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]
    }
}

/// Rotation of normalized image coordinates into the display orientation
///
/// Camera sensors deliver landscape-right images.
fn orientation_transform(orientation: Orientation) -> Affine {
    match orientation {
        Orientation::LandscapeRight => Affine::IDENTITY,
        // (x, y) -> (1 - x, 1 - y)
        Orientation::LandscapeLeft => Affine::new(-1.0, 0.0, 0.0, -1.0, 1.0, 1.0),
        // (x, y) -> (1 - y, x)
        Orientation::Portrait => Affine::new(0.0, 1.0, -1.0, 0.0, 1.0, 0.0),
        // (x, y) -> (y, 1 - x)
        Orientation::PortraitUpsideDown => Affine::new(0.0, -1.0, 1.0, 0.0, 0.0, 1.0),
    }
}

fn is_rotated(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Portrait | Orientation::PortraitUpsideDown
    )
}

/// Aspect-fill display transform for an image of `image_width × image_height`
///
/// Maps normalized image coordinates to normalized view coordinates: the
/// image is rotated into `orientation`, then scaled about the view centre
/// until it covers the whole viewport. An empty viewport yields the
/// rotation alone.
pub fn aspect_fill_display_transform(
    orientation: Orientation,
    image_width: u32,
    image_height: u32,
    viewport: ViewportSize,
) -> Affine {
    let rotation = orientation_transform(orientation);
    if viewport.is_empty() || image_width == 0 || image_height == 0 {
        return rotation;
    }

    let (w, h) = if is_rotated(orientation) {
        (image_height as f32, image_width as f32)
    } else {
        (image_width as f32, image_height as f32)
    };
    let image_aspect = w / h;
    let view_aspect = viewport.width / viewport.height;

    // Scale factors > 1 push part of the image outside [0, 1]
    let (sx, sy) = if image_aspect > view_aspect {
        (image_aspect / view_aspect, 1.0)
    } else {
        (1.0, view_aspect / image_aspect)
    };

    let fill = Affine::translation(-0.5, -0.5)
        .then(&Affine::scale(sx, sy))
        .then(&Affine::translation(0.5, 0.5));
    rotation.then(&fill)
}
