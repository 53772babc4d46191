use rand::Rng;
use tonpass_shared::BotResult;

// Coefficients are drawn as a whole number of hundredths so every value
// carries exactly two decimals: 100..=1100 -> 1.00..=11.00

pub const MIN_HUNDREDTHS: u32 = 100;
pub const MAX_HUNDREDTHS: u32 = 1100;

pub fn draw_coefficient<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let hundredths = rng.random_range(MIN_HUNDREDTHS..=MAX_HUNDREDTHS);
    hundredths as f64 / 100.0
}

/// Text drawn on the image and shown in the caption, e.g. `3.50x`.
pub fn coefficient_label(coefficient: f64) -> String {
    format!("{coefficient:.2}x")
}

/// Turns a coefficient into a PNG. Implementations must not keep the artifact
/// around once it is returned.
pub trait CoefficientRenderer: Send + Sync {
    fn render(&self, coefficient: f64) -> BotResult<Vec<u8>>;
}
