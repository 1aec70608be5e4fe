use super::layer_sizes;
use crate::result::{DeskpackError, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn open(source: &Path) -> Result<DynamicImage> {
    image::open(source)
        .map_err(|e| DeskpackError::process(format!("Cannot read {}: {}", source.display(), e)))
}

fn layers(img: &DynamicImage) -> Vec<(u32, Vec<u8>)> {
    let dim = img.width().min(img.height());
    layer_sizes(dim)
        .into_iter()
        .map(|size| {
            let resized = img.resize_exact(size, size, FilterType::Lanczos3);
            (size, resized.to_rgba8().into_raw())
        })
        .collect()
}

/// Multi-resolution `.ico`; the largest layer is PNG-compressed when it is at least 256 px.
pub fn write_ico(source: &Path, target: &Path) -> Result<()> {
    let img = open(source)?;
    let mut dir = ico::IconDir::new(ico::ResourceType::Icon);

    for (idx, (size, rgba)) in layers(&img).into_iter().enumerate() {
        let image = ico::IconImage::from_rgba_data(size, size, rgba);
        let entry = if idx == 0 && size >= 256 {
            ico::IconDirEntry::encode_as_png(&image)?
        } else {
            ico::IconDirEntry::encode_as_bmp(&image)?
        };
        dir.add_entry(entry);
    }

    dir.write(BufWriter::new(File::create(target)?))?;
    Ok(())
}

pub fn write_icns(source: &Path, target: &Path) -> Result<()> {
    let img = open(source)?;
    let mut family = icns::IconFamily::new();

    for (size, rgba) in layers(&img) {
        let image = icns::Image::from_data(icns::PixelFormat::RGBA, size, size, rgba)?;
        if let Err(e) = family.add_icon(&image) {
            log::debug!("icns has no slot for {}px: {}", size, e);
        }
    }

    family.write(BufWriter::new(File::create(target)?))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn ico_has_one_layer_per_size() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("logo.png");
        RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]))
            .save(&png)
            .unwrap();
        let ico_path = tmp.path().join("logo.ico");

        write_ico(&png, &ico_path).unwrap();

        let dir = ico::IconDir::read(File::open(&ico_path).unwrap()).unwrap();
        let mut widths: Vec<u32> = dir.entries().iter().map(|e| e.width()).collect();
        widths.sort();
        assert_eq!(widths, vec![16, 32, 48, 64]);
    }
}
