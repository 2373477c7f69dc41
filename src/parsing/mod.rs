//! Container structure parsers.
//!
//! Two container families are understood:
//!
//! - the chunked section container (`FOVb` header, `SECd` directory in the
//!   trailer, `SECi` image and `SECp` property sections);
//! - TIFF-based files, read through a minimal IFD chain walker.
//!
//! Every offset and length read from a file is validated against the
//! buffer before it is followed; violations surface as
//! [`MalformedContainer`](crate::RawError::MalformedContainer).

pub mod container;
pub mod directory;
pub mod image_section;
pub mod properties;
pub mod tiff;

#[cfg(test)]
pub(crate) mod test_util;

pub use container::{ContainerHeader, ContainerHeaderParser};
pub use directory::{Directory, DirectoryEntry, DirectoryParser, SectionKind};
pub use image_section::{ImageSection, ImageSectionParser};
pub use properties::{Properties, PropertyParser};
pub use tiff::{FieldType, Ifd, IfdEntry, Tiff, TiffParser};
