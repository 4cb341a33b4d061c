//! Screen bitmap assembly.
//!
//! A screenshot arrives as a run of Screen_Data packets, each starting with
//! a `u32` section code: one header giving the geometry, then the color
//! table (indexed formats only), then the pixel rows. Color table and pixel
//! packets carry a `u32` byte offset ahead of their data and must arrive in
//! order.

use navlink_core::{Result, Screenshot};

use super::{FormatName, RecordReader};

const SECTION_HEADER: u32 = 0;
const SECTION_COLOR_TABLE: u32 = 1;
const SECTION_PIXELS: u32 = 2;

/// Largest pixel area accepted, in bytes.
const MAX_BITMAP_LEN: usize = 4 << 20;

const FORMAT: FormatName = FormatName::Other("screen bitmap");

/// Collects Screen_Data packets into a [`Screenshot`].
#[derive(Debug, Default)]
pub struct ScreenReader {
    shot: Option<Screenshot>,
    palette_len: usize,
    pixels_len: usize,
}

impl ScreenReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one packet's payload.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let mut r = RecordReader::new(FORMAT, data);
        let section = r.u32()?;
        if section == SECTION_HEADER {
            if self.shot.is_some() {
                return Err(r.invalid("repeated section", section));
            }
            r.skip(4)?;
            let bytes_per_line = r.u32()?;
            let bits_per_pixel = r.u32()?;
            let width = r.u32()?;
            let height = r.u32()?;
            r.finish()?;
            return self.start(bytes_per_line, bits_per_pixel, width, height);
        }
        let Some(shot) = self.shot.as_mut() else {
            return Err(r.invalid("section before header", section));
        };
        match section {
            SECTION_COLOR_TABLE => {
                let offset = r.u32()?;
                append(&mut r, &mut shot.palette, offset, self.palette_len, "color table offset")
            }
            SECTION_PIXELS => {
                let offset = r.u32()?;
                append(&mut r, &mut shot.pixels, offset, self.pixels_len, "pixel offset")
            }
            other => Err(r.invalid("section", other)),
        }
    }

    fn start(&mut self, bytes_per_line: u32, bpp: u32, width: u32, height: u32) -> Result<()> {
        let r = RecordReader::new(FORMAT, &[]);
        if ![1, 2, 4, 8, 16, 24, 32].contains(&bpp) {
            return Err(r.invalid("bits per pixel", bpp));
        }
        let line_bits = u64::from(width) * u64::from(bpp);
        if line_bits > u64::from(bytes_per_line) * 8 {
            return Err(r.invalid("bytes per line", bytes_per_line));
        }
        self.pixels_len = (bytes_per_line as usize)
            .checked_mul(height as usize)
            .filter(|&n| n <= MAX_BITMAP_LEN)
            .ok_or_else(|| r.invalid("bitmap size", format!("{bytes_per_line}x{height}")))?;
        self.palette_len = if bpp <= 8 { 4 << bpp } else { 0 };
        self.shot = Some(Screenshot {
            width,
            height,
            bits_per_pixel: bpp,
            bytes_per_line,
            palette: Vec::with_capacity(self.palette_len),
            pixels: Vec::with_capacity(self.pixels_len),
        });
        Ok(())
    }

    /// Bytes received and bytes expected. Both are zero until the header
    /// arrives.
    pub fn progress(&self) -> (usize, usize) {
        match &self.shot {
            Some(shot) => (
                shot.palette.len() + shot.pixels.len(),
                self.palette_len + self.pixels_len,
            ),
            None => (0, 0),
        }
    }

    pub fn is_complete(&self) -> bool {
        let (done, total) = self.progress();
        self.shot.is_some() && done == total
    }

    /// The finished bitmap, or `None` while sections are outstanding.
    pub fn finish(self) -> Option<Screenshot> {
        if self.is_complete() {
            self.shot
        } else {
            None
        }
    }
}

fn append(
    r: &mut RecordReader<'_>,
    buf: &mut Vec<u8>,
    offset: u32,
    limit: usize,
    field: &str,
) -> Result<()> {
    if offset as usize != buf.len() {
        return Err(r.invalid(field, offset));
    }
    let data = r.rest();
    if buf.len() + data.len() > limit {
        return Err(r.invalid(field, buf.len() + data.len()));
    }
    buf.extend_from_slice(data);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn section(code: u32, fields: &[u32], data: &[u8]) -> Vec<u8> {
        let mut out = code.to_le_bytes().to_vec();
        for f in fields {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(data);
        out
    }

    /// Header: reserved, bytes per line, bits per pixel, width, height.
    pub(crate) fn header(bytes_per_line: u32, bpp: u32, width: u32, height: u32) -> Vec<u8> {
        section(SECTION_HEADER, &[0, bytes_per_line, bpp, width, height], &[])
    }

    pub(crate) fn colors(offset: u32, data: &[u8]) -> Vec<u8> {
        section(SECTION_COLOR_TABLE, &[offset], data)
    }

    pub(crate) fn pixels(offset: u32, data: &[u8]) -> Vec<u8> {
        section(SECTION_PIXELS, &[offset], data)
    }

    #[test]
    fn monochrome_bitmap() {
        let mut reader = ScreenReader::new();
        reader.push(&header(2, 1, 16, 2)).unwrap();
        assert_eq!(reader.progress(), (0, 12));
        reader.push(&colors(0, &[0, 0, 0, 0, 255, 255, 255, 0])).unwrap();
        reader.push(&pixels(0, &[0xF0, 0x0F])).unwrap();
        assert!(!reader.is_complete());
        reader.push(&pixels(2, &[0xAA, 0x55])).unwrap();
        assert!(reader.is_complete());

        let shot = reader.finish().unwrap();
        assert_eq!((shot.width, shot.height, shot.bits_per_pixel), (16, 2, 1));
        assert_eq!(shot.palette.len(), 8);
        assert_eq!(shot.pixels, vec![0xF0, 0x0F, 0xAA, 0x55]);
    }

    #[test]
    fn true_color_has_no_palette() {
        let mut reader = ScreenReader::new();
        reader.push(&header(6, 24, 2, 1)).unwrap();
        reader.push(&pixels(0, &[1, 2, 3, 4, 5, 6])).unwrap();
        let shot = reader.finish().unwrap();
        assert!(shot.palette.is_empty());
    }

    #[test]
    fn out_of_order_sections() {
        let mut reader = ScreenReader::new();
        let err = reader.push(&pixels(0, &[1])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed screen bitmap record: invalid section before header 2"
        );
        reader.push(&header(2, 8, 2, 1)).unwrap();
        assert!(reader.push(&pixels(1, &[1])).is_err());
        assert!(reader.push(&header(2, 8, 2, 1)).is_err());
        assert!(reader.push(&pixels(0, &[1, 2, 3])).is_err());
    }

    #[test]
    fn implausible_headers() {
        assert!(ScreenReader::new().push(&header(2, 3, 4, 1)).is_err());
        assert!(ScreenReader::new().push(&header(1, 8, 2, 1)).is_err());
        assert!(ScreenReader::new()
            .push(&header(u32::MAX, 32, 1, u32::MAX))
            .is_err());
        assert!(ScreenReader::new().finish().is_none());
    }
}
