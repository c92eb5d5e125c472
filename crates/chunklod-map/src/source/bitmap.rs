use crate::error::ChunkerResult;
use crate::heightfield::{Heightfield, HeightfieldParams};
use crate::storage::StorageBackend;

use std::io::{BufRead, Seek};

/// Decodes any bitmap format `image` recognizes, taking heights from the red channel.
///
/// Pixel `(x, y)` becomes sample `(x, z = y)`, so the top of the image is the north edge. Bitmaps carry no horizontal
/// scale, so `params.sample_spacing` is used as is.
pub fn read_bitmap<R: BufRead + Seek>(
    input: R,
    params: HeightfieldParams,
    backend: &StorageBackend,
) -> ChunkerResult<Heightfield> {
    let image = image::io::Reader::new(input)
        .with_guessed_format()?
        .decode()?
        .into_rgb8();
    let (width, height) = image.dimensions();
    log::info!("reading {}x{} bitmap", width, height);

    let mut hf_input = Heightfield::for_input(width, height, params, backend)?;
    for (x, z, pixel) in image.enumerate_pixels() {
        hf_input.set_raw_sample(x, z, f32::from(pixel[0]));
    }

    hf_input.finish()
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::error::ChunkerError;
    use crate::source::bt::test::{encode_bt, Samples};
    use crate::source::read_heightfield;

    use chunklod_core::approx::assert_relative_eq;
    use chunklod_core::glam::IVec2;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// A PNG whose red channel is `x + 10 * y` and whose other channels are noise.
    pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x + 10 * y) as u8, 255, (x * y) as u8])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn params() -> HeightfieldParams {
        HeightfieldParams {
            sample_spacing: 4.0,
            vertical_scale: 0.5,
            input_vertical_scale: 1.0,
        }
    }

    #[test]
    fn size_10_extends_to_17() {
        let hf = read_bitmap(Cursor::new(encode_png(10, 10)), params(), &StorageBackend::Memory).unwrap();

        assert_eq!(hf.size(), 17);
        assert_relative_eq!(hf.sample_spacing(), 4.0);
        assert_eq!(hf.height(IVec2::new(3, 2)), 2 * 23);
        assert_eq!(hf.height(IVec2::new(16, 2)), 2 * 29);
        assert_eq!(hf.height(IVec2::new(3, 16)), 2 * 93);
        assert_eq!(hf.height(IVec2::new(16, 16)), 2 * 99);
    }

    #[test]
    fn bt_magic_decides_the_decoder() {
        let hf = read_heightfield(Cursor::new(encode_png(5, 5)), params(), &StorageBackend::Memory).unwrap();
        assert_eq!(hf.height(IVec2::new(4, 4)), 2 * 44);

        let bt = encode_bt(3, 3, 2.0, Samples::Short(vec![7; 9]));
        let hf = read_heightfield(Cursor::new(bt), params(), &StorageBackend::Memory).unwrap();
        assert_eq!(hf.height(IVec2::new(1, 1)), 14);
        assert_relative_eq!(hf.sample_spacing(), 1.0);
    }

    #[test]
    fn garbage_is_an_image_error() {
        let result = read_heightfield(
            Cursor::new(b"definitely not terrain".to_vec()),
            params(),
            &StorageBackend::Memory,
        );
        assert!(matches!(result, Err(ChunkerError::Image(_))));
    }
}
