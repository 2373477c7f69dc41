//! Decode results: the sample plane, bad pixels and image metadata.

use std::collections::{BTreeMap, BTreeSet};

/// Caller-owned sample buffer, `width * height` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlane<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> OutputPlane<T> {
    /// Zero-initialized plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T> OutputPlane<T> {
    /// Wrap an existing buffer. Returns `None` if its length is not
    /// `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        (width.checked_mul(height) == Some(data.len())).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Row `y`, or `None` past the last row.
    pub fn row(&self, y: usize) -> Option<&[T]> {
        (y < self.height).then(|| &self.data[y * self.width..(y + 1) * self.width])
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get(y * self.width + x)
        } else {
            None
        }
    }
}

/// Coordinate of a sample flagged as suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BadPixel {
    pub x: u32,
    pub y: u32,
}

/// Bad pixels found during one decode.
///
/// Workers append concurrently, so the order is unspecified. Compare
/// lists with [`BadPixelList::to_set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadPixelList {
    positions: Vec<BadPixel>,
}

impl BadPixelList {
    pub(crate) fn from_vec(positions: Vec<BadPixel>) -> Self {
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BadPixel> {
        self.positions.iter()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.positions.contains(&BadPixel { x, y })
    }

    pub fn to_set(&self) -> BTreeSet<BadPixel> {
        self.positions.iter().copied().collect()
    }
}

/// Summary of one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    /// Slices decoded.
    pub slices: usize,
    /// Slices whose payload ended early and were finished from zero bits.
    pub truncated_slices: usize,
    pub bad_pixels: BadPixelList,
}

/// Color of one cell of a 2x2 color filter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfaColor {
    Red,
    Green,
    Blue,
}

/// Image description gathered from the container.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub width: usize,
    pub height: usize,
    pub make: Option<String>,
    pub model: Option<String>,
    /// 2x2 CFA layout, row-major: (0,0), (1,0), (0,1), (1,1).
    pub cfa: Option<[CfaColor; 4]>,
    /// Black level per CFA position, same order as `cfa`.
    pub black_levels: Option<[u16; 4]>,
    /// White balance multipliers, red/green/blue.
    pub wb_coeffs: Option<[f32; 3]>,
    /// Free-form key/value properties stored in the container.
    pub properties: BTreeMap<String, String>,
}

/// A decoded image.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub metadata: RawMetadata,
    pub plane: OutputPlane<u16>,
    pub report: DecodeReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_access() {
        let mut plane = OutputPlane::<u16>::new(3, 2);
        plane.data_mut()[4] = 7;
        assert_eq!(plane.get(1, 1), Some(&7));
        assert_eq!(plane.get(3, 0), None);
        assert_eq!(plane.row(1), Some(&[0, 7, 0][..]));
        assert_eq!(plane.row(2), None);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(OutputPlane::from_vec(2, 2, vec![0f32; 4]).is_some());
        assert!(OutputPlane::from_vec(2, 2, vec![0f32; 5]).is_none());
    }

    #[test]
    fn test_bad_pixels_compare_as_sets() {
        let a = BadPixelList::from_vec(vec![BadPixel { x: 1, y: 2 }, BadPixel { x: 0, y: 0 }]);
        let b = BadPixelList::from_vec(vec![BadPixel { x: 0, y: 0 }, BadPixel { x: 1, y: 2 }]);
        assert_ne!(a, b);
        assert_eq!(a.to_set(), b.to_set());
        assert!(a.contains(1, 2));
    }
}
