//! Deterministic icon layout for cluster glyphs.
//!
//! Each member icon is placed inside the cluster circle at a position and
//! size derived from a SHA-256 hash of the icon string. Icons are sorted
//! before layout, so the same cluster composition always renders the
//! same glyph regardless of member order.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Most icons drawn inside one glyph.
pub const MAX_GLYPH_ICONS: usize = 8;

/// Icon size bounds as a fraction of the glyph diameter.
const MIN_ICON_RATIO: f64 = 0.28;
const ICON_RATIO_SPREAD: f64 = 0.14;

/// One icon placed inside a glyph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlyphIcon {
    /// The icon (usually an emoji).
    pub icon: String,
    /// Center x offset from the glyph's left edge, in pixels.
    pub x: f64,
    /// Center y offset from the glyph's top edge, in pixels.
    pub y: f64,
    /// Rendered size in pixels.
    pub size: f64,
}

/// A rendered cluster glyph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterGlyph {
    /// Circle diameter in pixels.
    pub diameter: f64,
    /// Number of members the glyph stands for.
    pub count: usize,
    /// Placed icons, at most [`MAX_GLYPH_ICONS`].
    pub icons: Vec<GlyphIcon>,
}

/// Glyph diameter for a cluster of `count` members.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cluster_diameter(count: usize) -> f64 {
    8.0f64
        .mul_add((count.max(1) as f64).log2(), 32.0)
        .min(72.0)
}

fn unit(bytes: [u8; 4]) -> f64 {
    f64::from(u32::from_be_bytes(bytes)) / f64::from(u32::MAX)
}

fn place(icon: &str, occurrence: usize, diameter: f64) -> GlyphIcon {
    let digest = Sha256::digest(format!("{icon}#{occurrence}").as_bytes());
    let angle_u = unit([digest[0], digest[1], digest[2], digest[3]]);
    let dist_u = unit([digest[4], digest[5], digest[6], digest[7]]);
    let size_u = unit([digest[8], digest[9], digest[10], digest[11]]);

    let size = diameter * ICON_RATIO_SPREAD.mul_add(size_u, MIN_ICON_RATIO);
    let reach = (diameter - size) / 2.0;
    let angle = angle_u * std::f64::consts::TAU;
    let dist = dist_u.sqrt() * reach;
    let center = diameter / 2.0;

    GlyphIcon {
        icon: icon.to_owned(),
        x: dist.mul_add(angle.cos(), center),
        y: dist.mul_add(angle.sin(), center),
        size,
    }
}

/// Lays out the member icons of a cluster inside a circle.
///
/// Empty icon strings are skipped. Repeated icons are hashed together
/// with their occurrence number so they do not stack exactly.
#[must_use]
pub fn cluster_glyph(icons: &[String], diameter: f64) -> ClusterGlyph {
    let mut sorted: Vec<&str> = icons
        .iter()
        .map(String::as_str)
        .filter(|i| !i.is_empty())
        .collect();
    sorted.sort_unstable();

    let mut placed = Vec::new();
    let mut previous: Option<&str> = None;
    let mut occurrence = 0;

    for icon in sorted.into_iter().take(MAX_GLYPH_ICONS) {
        occurrence = if previous == Some(icon) {
            occurrence + 1
        } else {
            0
        };
        previous = Some(icon);
        placed.push(place(icon, occurrence, diameter));
    }

    ClusterGlyph {
        diameter,
        count: icons.len(),
        icons: placed,
    }
}
