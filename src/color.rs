use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    #[error("unrecognized color '{0}'")]
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);

/// Named colors understood by `Rgb::parse` (single-letter shorthands plus common CSS names)
const NAMED_COLORS: [(&str, Rgb); 30] = [
    ("b", Rgb(0, 0, 255)),
    ("g", Rgb(0, 128, 0)),
    ("r", Rgb(255, 0, 0)),
    ("c", Rgb(0, 191, 191)),
    ("m", Rgb(191, 0, 191)),
    ("y", Rgb(191, 191, 0)),
    ("k", BLACK),
    ("w", WHITE),
    ("black", BLACK),
    ("white", WHITE),
    ("red", Rgb(255, 0, 0)),
    ("green", Rgb(0, 128, 0)),
    ("blue", Rgb(0, 0, 255)),
    ("cyan", Rgb(0, 255, 255)),
    ("magenta", Rgb(255, 0, 255)),
    ("yellow", Rgb(255, 255, 0)),
    ("orange", Rgb(255, 165, 0)),
    ("purple", Rgb(128, 0, 128)),
    ("brown", Rgb(165, 42, 42)),
    ("pink", Rgb(255, 192, 203)),
    ("gray", Rgb(128, 128, 128)),
    ("grey", Rgb(128, 128, 128)),
    ("lightgray", Rgb(211, 211, 211)),
    ("lightgrey", Rgb(211, 211, 211)),
    ("darkgray", Rgb(169, 169, 169)),
    ("darkgrey", Rgb(169, 169, 169)),
    ("navy", Rgb(0, 0, 128)),
    ("teal", Rgb(0, 128, 128)),
    ("olive", Rgb(128, 128, 0)),
    ("gold", Rgb(255, 215, 0)),
];

impl Rgb {
    /// Parse `#rrggbb`, `#rgb`, `r,g,b` or a color name.
    pub fn parse(color_str: &str) -> Result<Rgb, ColorError> {
        let unrecognized = || ColorError::Unrecognized(color_str.to_string());
        let trimmed = color_str.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(unrecognized());
            }
            let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| unrecognized());
            return match hex.len() {
                6 => Ok(Rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
                3 => {
                    // #abc is shorthand for #aabbcc
                    let r = channel(&hex[0..1])?;
                    let g = channel(&hex[1..2])?;
                    let b = channel(&hex[2..3])?;
                    Ok(Rgb(r * 17, g * 17, b * 17))
                }
                _ => Err(unrecognized()),
            };
        }

        if trimmed.contains(',') {
            let rgb_parts: Vec<u8> = trimmed
                .split(',')
                .map(|s| s.trim().parse().map_err(|_| unrecognized()))
                .collect::<Result<_, _>>()?;
            return match rgb_parts.as_slice() {
                [r, g, b] => Ok(Rgb(*r, *g, *b)),
                _ => Err(unrecognized()),
            };
        }

        let lower = trimmed.to_ascii_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| *rgb)
            .ok_or_else(unrecognized)
    }
}

/// Stable color for a feature without an explicit one, derived from the
/// SHA-256 digest of its name and brightened.
pub fn default_feature_color(name: &str) -> Rgb {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut r = digest[24] as f32 / 255.0;
    let mut g = digest[8] as f32 / 255.0;
    let mut b = digest[16] as f32 / 255.0;

    let sum = r + g + b;
    if sum > 0.0 {
        r /= sum;
        g /= sum;
        b /= sum;
    }

    let max_component = r.max(g).max(b);
    let f = if max_component > 0.0 {
        1.5f32.min(1.0 / max_component)
    } else {
        1.0
    };

    let scale = |c: f32| (255.0 * (c * f).min(1.0)).round() as u8;
    Rgb(scale(r), scale(g), scale(b))
}
