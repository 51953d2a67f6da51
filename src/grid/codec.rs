//! Binary persistence for grids.
//!
//! Wire layout: an 8-byte big-endian header carrying the min and max
//! corners as `u16`s, followed by one 36-byte body per page (nine
//! little-endian `u32` tile words in NW..SE index order), streamed in
//! row-major page order over the covered range. No trailer. Entity state,
//! observer lists and page flags are not persisted.

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;

use thiserror::Error;
use tracing::debug;

use crate::geom::{Point, Rect};
use crate::grid::page::TILES_PER_PAGE;
use crate::grid::Grid;

const HEADER_SIZE: usize = 8;
const PAGE_WIRE_SIZE: usize = TILES_PER_PAGE * 4;

#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying byte source or sink failed; surfaced untransformed.
    #[error("i/o failure")]
    Io(#[from] io::Error),

    /// The stream ended before the grid body was complete.
    #[error("stream truncated before the grid body was complete")]
    Truncated,

    /// The header describes a grid this engine cannot represent.
    #[error("header describes an invalid {width}x{height} grid")]
    BadHeader { width: i32, height: i32 },
}

impl<T> Grid<T> {
    /// Writes the whole grid to `dst`. Returns the number of bytes
    /// written.
    pub fn write_to<W: Write>(&self, dst: &mut W) -> Result<u64, CodecError> {
        let size = self.size();
        let max = Point::new(size.x - 1, size.y - 1);

        let mut header = [0u8; HEADER_SIZE];
        header[4..6].copy_from_slice(&(max.x as u16).to_be_bytes());
        header[6..8].copy_from_slice(&(max.y as u16).to_be_bytes());
        dst.write_all(&header)?;

        let mut written = HEADER_SIZE as u64;
        let mut failed: Option<io::Error> = None;
        self.pages_within(
            Rect {
                min: Point::default(),
                max: size,
            },
            |page| {
                if failed.is_some() {
                    return;
                }
                let mut body = [0u8; PAGE_WIRE_SIZE];
                for idx in 0..TILES_PER_PAGE {
                    let word = page.load(idx as u8).to_le_bytes();
                    body[idx * 4..idx * 4 + 4].copy_from_slice(&word);
                }
                match dst.write_all(&body) {
                    Ok(()) => written += PAGE_WIRE_SIZE as u64,
                    Err(e) => failed = Some(e),
                }
            },
        );
        if let Some(e) = failed {
            return Err(e.into());
        }

        debug!(bytes = written, width = size.x, height = size.y, "grid serialized");
        Ok(written)
    }

    /// Reads a grid back from `src`. The decoded dimensions must be
    /// positive multiples of three.
    pub fn read_from<R: Read>(src: &mut R) -> Result<Grid<T>, CodecError> {
        let mut header = [0u8; HEADER_SIZE];
        read_chunk(src, &mut header)?;

        let width = i32::from(u16::from_be_bytes([header[4], header[5]])) + 1;
        let height = i32::from(u16::from_be_bytes([header[6], header[7]])) + 1;
        if width % 3 != 0 || height % 3 != 0 || width > i32::from(i16::MAX) || height > i32::from(i16::MAX)
        {
            return Err(CodecError::BadHeader { width, height });
        }

        let grid = Grid::new(width as i16, height as i16);
        let mut failed: Option<CodecError> = None;
        grid.pages_within(
            Rect {
                min: Point::default(),
                max: grid.size(),
            },
            |page| {
                if failed.is_some() {
                    return;
                }
                let mut body = [0u8; PAGE_WIRE_SIZE];
                if let Err(e) = read_chunk(src, &mut body) {
                    failed = Some(e);
                    return;
                }
                for idx in 0..TILES_PER_PAGE {
                    let o = idx * 4;
                    let word =
                        u32::from_le_bytes([body[o], body[o + 1], body[o + 2], body[o + 3]]);
                    page.tile(idx as u8).store(word, Ordering::SeqCst);
                }
            },
        );
        if let Some(e) = failed {
            return Err(e);
        }

        debug!(width, height, "grid deserialized");
        Ok(grid)
    }
}

fn read_chunk<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    src.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CodecError::Truncated,
        _ => CodecError::Io(e),
    })
}
