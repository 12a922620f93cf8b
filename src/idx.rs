//! Reader and writer for the big-endian IDX files MNIST ships in.
//!
//! Image file: `i32` magic `0x00000803`, `i32` count, `i32` rows, `i32` cols,
//! then `count * rows * cols` bytes, row-major per image.
//! Label file: `i32` magic `0x00000801`, `i32` count, then `count` bytes.

use crate::error::{PrepError, Result};
use crate::{Label, RawImage};
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const IMAGE_MAGIC: i32 = 0x0000_0803;
pub const LABEL_MAGIC: i32 = 0x0000_0801;
const PREALLOC_LIMIT: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
}

impl ImageHeader {
    /// Bytes per image, `None` if `rows * cols` overflows.
    pub fn pixels(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_len<R: Read>(r: &mut R, what: &str) -> Result<usize> {
    let v = read_i32(r)?;
    usize::try_from(v).map_err(|_| PrepError::shape(format!("negative {what} in header: {v}")))
}

fn expect_magic<R: Read>(r: &mut R, expected: i32) -> Result<()> {
    let found = read_i32(r)?;
    if found != expected {
        return Err(PrepError::BadMagic { expected, found });
    }
    Ok(())
}

/// Reads the 16-byte image header, leaving `r` positioned at the first pixel.
pub fn read_image_header<R: Read>(r: &mut R) -> Result<ImageHeader> {
    expect_magic(r, IMAGE_MAGIC)?;
    let count = read_len(r, "image count")?;
    let rows = read_len(r, "row count")?;
    let cols = read_len(r, "column count")?;
    Ok(ImageHeader { count, rows, cols })
}

pub fn read_images<R: Read>(mut r: R) -> Result<Vec<RawImage>> {
    let header = read_image_header(&mut r)?;
    let pixels = header.pixels().ok_or_else(|| {
        PrepError::shape(format!("{}x{} images overflow", header.rows, header.cols))
    })?;
    if pixels == 0 && header.count > 0 {
        return Err(PrepError::shape(format!(
            "{} images of {}x{} pixels",
            header.count, header.rows, header.cols
        )));
    }
    // header sizes are untrusted until the payload has actually been read
    let mut images = Vec::with_capacity(header.count.min(PREALLOC_LIMIT));
    for i in 0..header.count {
        let mut img = Vec::with_capacity(pixels.min(PREALLOC_LIMIT));
        r.by_ref().take(pixels as u64).read_to_end(&mut img)?;
        if img.len() != pixels {
            return Err(truncated(format!(
                "image {i} holds {} of {pixels} bytes",
                img.len()
            )));
        }
        images.push(img);
    }
    Ok(images)
}

pub fn read_labels<R: Read>(mut r: R) -> Result<Vec<Label>> {
    expect_magic(&mut r, LABEL_MAGIC)?;
    let count = read_len(&mut r, "label count")?;
    let mut labels = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    r.take(count as u64).read_to_end(&mut labels)?;
    if labels.len() != count {
        return Err(truncated(format!(
            "label file declares {count} labels but holds {}",
            labels.len()
        )));
    }
    Ok(labels)
}

fn truncated(msg: String) -> PrepError {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, msg).into()
}

/// Opens `path` (failing before any parsing) and reads every image.
pub fn load_images(path: impl AsRef<Path>) -> Result<Vec<RawImage>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let images = read_images(BufReader::new(file))?;
    info!("loaded {} images from {}", images.len(), path.display());
    Ok(images)
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<Label>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let labels = read_labels(BufReader::new(file))?;
    info!("loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Opens both files before parsing either, so a missing label file is
/// reported without decoding the images first.
pub fn load_dataset(
    images: impl AsRef<Path>,
    labels: impl AsRef<Path>,
) -> Result<(Vec<RawImage>, Vec<Label>)> {
    let (images, labels) = (images.as_ref(), labels.as_ref());
    let image_file = File::open(images)?;
    let label_file = File::open(labels)?;
    let images_read = read_images(BufReader::new(image_file))?;
    let labels_read = read_labels(BufReader::new(label_file))?;
    info!(
        "loaded {} images from {} and {} labels from {}",
        images_read.len(),
        images.display(),
        labels_read.len(),
        labels.display()
    );
    Ok((images_read, labels_read))
}

fn header_i32(v: usize, what: &str) -> Result<i32> {
    i32::try_from(v).map_err(|_| PrepError::shape(format!("{what} {v} does not fit the header")))
}

/// Writes `images` as an IDX image file. Every image must hold `rows * cols` bytes.
pub fn write_images<W: Write>(
    mut w: W,
    images: &[RawImage],
    rows: usize,
    cols: usize,
) -> Result<()> {
    let pixels = rows * cols;
    if let Some((i, img)) = images.iter().enumerate().find(|(_, img)| img.len() != pixels) {
        return Err(PrepError::shape(format!(
            "image {i} has {} bytes, expected {rows}x{cols}",
            img.len()
        )));
    }
    w.write_all(&IMAGE_MAGIC.to_be_bytes())?;
    w.write_all(&header_i32(images.len(), "image count")?.to_be_bytes())?;
    w.write_all(&header_i32(rows, "row count")?.to_be_bytes())?;
    w.write_all(&header_i32(cols, "column count")?.to_be_bytes())?;
    for img in images {
        w.write_all(img)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_labels<W: Write>(mut w: W, labels: &[Label]) -> Result<()> {
    w.write_all(&LABEL_MAGIC.to_be_bytes())?;
    w.write_all(&header_i32(labels.len(), "label count")?.to_be_bytes())?;
    w.write_all(labels)?;
    w.flush()?;
    Ok(())
}

pub fn save_images(
    path: impl AsRef<Path>,
    images: &[RawImage],
    rows: usize,
    cols: usize,
) -> Result<()> {
    write_images(BufWriter::new(File::create(path)?), images, rows, cols)
}

pub fn save_labels(path: impl AsRef<Path>, labels: &[Label]) -> Result<()> {
    write_labels(BufWriter::new(File::create(path)?), labels)
}
