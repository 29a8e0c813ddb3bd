//! Launcher icon preparation.
//!
//! Derives every density raster and the round variants from the single
//! project icon. Projects without an icon get a solid tile in the primary
//! theme color so the manifest's mipmap references always resolve.

use std::fs;

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

use crate::context::BuildContext;
use crate::error::{TaskError, TaskResult};

/// Density bucket to raster edge length in pixels.
const DENSITIES: &[(&str, u32)] = &[
    ("mdpi", 48),
    ("hdpi", 72),
    ("xhdpi", 96),
    ("xxhdpi", 144),
    ("xxxhdpi", 192),
];

pub(crate) fn prepare_icons(ctx: &mut BuildContext) -> TaskResult {
    let source = match &ctx.project.icon {
        Some(path) => {
            let bytes = fs::read(path)?;
            image::load_from_memory(&bytes)
                .map_err(|err| TaskError::Configuration(format!("couldn't read icon '{path}': {err}")))?
        }
        None => solid_tile(&ctx.project.primary_color)?,
    };

    for &(density, size) in DENSITIES {
        let dir = ctx.paths.res_dir.join(format!("mipmap-{density}"));
        fs::create_dir_all(&dir)?;

        let scaled = source.resize_exact(size, size, FilterType::Lanczos3);
        scaled
            .save(dir.join("ic_launcher.png"))
            .map_err(|err| TaskError::Configuration(format!("couldn't write icon: {err}")))?;

        let round = round_mask(&scaled);
        DynamicImage::ImageRgba8(round)
            .save(dir.join("ic_launcher_round.png"))
            .map_err(|err| TaskError::Configuration(format!("couldn't write icon: {err}")))?;
    }

    // Foreground layer reused by adaptive icon declarations.
    let foreground = ctx.paths.res_dir.join("mipmap-anydpi");
    fs::create_dir_all(&foreground)?;
    source
        .resize_exact(108, 108, FilterType::Lanczos3)
        .save(foreground.join("ic_launcher_foreground.png"))
        .map_err(|err| TaskError::Configuration(format!("couldn't write icon: {err}")))?;

    Ok(())
}

fn solid_tile(color: &str) -> Result<DynamicImage, TaskError> {
    let rgba = parse_color(color)?;
    let mut img = RgbaImage::new(192, 192);
    for pixel in img.pixels_mut() {
        *pixel = rgba;
    }
    Ok(DynamicImage::ImageRgba8(img))
}

fn parse_color(color: &str) -> Result<Rgba<u8>, TaskError> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TaskError::Configuration(format!(
            "invalid theme color '{color}'"
        )));
    }
    let parse = |range| u8::from_str_radix(&hex[range], 16).unwrap();
    Ok(Rgba([parse(0..2), parse(2..4), parse(4..6), 0xFF]))
}

/// Zero the alpha of every pixel outside the inscribed circle.
fn round_mask(img: &DynamicImage) -> RgbaImage {
    let mut out = img.to_rgba8();
    let (w, h) = out.dimensions();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let radius = cx.min(cy);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        if dx * dx + dy * dy > radius * radius {
            pixel.0[3] = 0;
        }
    }

    out
}
