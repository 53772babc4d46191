use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tonpass_core::{coefficient_label, CoefficientRenderer};
use tonpass_shared::{BotError, BotResult};

pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 200;
pub const FONT_PX: f32 = 72.0;
const BACKGROUND: Rgb<u8> = Rgb([20, 20, 20]);
const TEXT_FILL: Rgb<u8> = Rgb([255, 255, 0]);

const CANDIDATE_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Resolves the font file once at startup: an explicit path first, then a
/// list of common system locations.
#[derive(Debug, Clone, Default)]
pub struct FontLocator {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl FontLocator {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            candidates: CANDIDATE_FONTS.iter().map(PathBuf::from).collect(),
        }
    }

    pub fn with_candidates(explicit: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self { explicit, candidates }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        self.explicit
            .iter()
            .chain(self.candidates.iter())
            .find(|p| p.is_file())
            .cloned()
    }
}

/// Top-left corner that centers a `text_w`×`text_h` box on the canvas.
pub fn centered_origin(text_w: u32, text_h: u32) -> (i32, i32) {
    let x = (WIDTH as i32 - text_w as i32) / 2;
    let y = (HEIGHT as i32 - text_h as i32) / 2;
    (x, y)
}

pub struct PngRenderer {
    font: Option<FontVec>,
}

impl PngRenderer {
    /// A renderer without a usable font still starts; each render then fails.
    pub fn new(locator: &FontLocator) -> Self {
        let font = match locator.locate() {
            Some(path) => match load_font(&path) {
                Ok(font) => {
                    tracing::info!("coefficient font: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    tracing::warn!("{e}");
                    None
                }
            },
            None => {
                tracing::warn!("no font found; set FONT_PATH to render coefficients");
                None
            }
        };
        Self { font }
    }

    pub fn from_font(font: FontVec) -> Self {
        Self { font: Some(font) }
    }
}

pub fn load_font(path: &Path) -> BotResult<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| BotError::Render(format!("read font {}: {e}", path.display())))?;
    FontVec::try_from_vec(bytes).map_err(|e| BotError::Render(format!("invalid font {}: {e}", path.display())))
}

impl CoefficientRenderer for PngRenderer {
    fn render(&self, coefficient: f64) -> BotResult<Vec<u8>> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| BotError::Render("no font available".into()))?;
        let text = coefficient_label(coefficient);
        let scale = PxScale::from(FONT_PX);

        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        let (w, h) = text_size(scale, font, &text);
        let (x, y) = centered_origin(w, h);
        draw_text_mut(&mut img, TEXT_FILL, x, y, scale, font, &text);

        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| BotError::Render(e.to_string()))?;
        Ok(png)
    }
}
