/// An RGB fill color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    pub const fn gray(level: f32) -> Self {
        Rgb(level, level, level)
    }
}

/// Accepts `#rrggbb` and `rgb(r, g, b)` with 0..=255 channels. Anything else
/// is black.
pub fn parse_color(value: &str) -> Rgb {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).unwrap_or(Rgb::BLACK);
    }
    if let Some(inner) = value
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_components(inner).unwrap_or(Rgb::BLACK);
    }
    Rgb::BLACK
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|value| value as f32 / 255.0)
    };
    Some(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn parse_components(inner: &str) -> Option<Rgb> {
    let values = inner
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let [r, g, b] = values.as_slice() else {
        return None;
    };
    let channel = |value: f32| value.clamp(0.0, 255.0) / 255.0;
    Some(Rgb(channel(*r), channel(*g), channel(*b)))
}
