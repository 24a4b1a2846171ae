//! A streaming, indexable parser for OSM data in PBF format.
//!
//! An OSM PBF file is a sequence of length-framed blobs (see [`frame`]), each holding a
//! compressed [`pbf::HeaderBlock`] or [`pbf::PrimitiveBlock`] (see [`decompress`]). [`decode`]
//! expands a primitive block's dense nodes, ways and relations into calls on a user-supplied
//! [`Consumer`]. [`reader::PbfDecoder`] ties a byte source, a [`BlobIndex`] and the
//! [`orchestrator`]'s feeder/worker pipeline together into the crate's main entry point.
//!
//! The library also provides utilities for reading densely or delta encoded data in these blocks,
//! in [`dense`] and [`elements`].
//!
//! Raw header and primitive block definitions (generated by [Prost](https://github.com/tokio-rs/prost)) are exported
//! through the `pbf` module.
//!
//! # Links
//!
//! - [OSM PBF format documentation](https://wiki.openstreetmap.org/wiki/PBF_Format)

#![forbid(unsafe_code)]

pub mod config;
pub mod decode;
pub mod decompress;
pub mod dense;
pub mod elements;
pub mod error;
pub mod frame;
pub mod index;
pub mod orchestrator;
pub mod pbf;
pub mod reader;
pub mod util;

pub use config::ParseConfig;
pub use elements::{collect_tags, new_tag_reader, Consumer, DeltaValueReader, Member, MemberType, Node, Relation, TagReader, Way};
pub use error::{Error, FormatError, Result};
pub use frame::{BlockType, FrameReader, RawBlob};
pub use index::{BlobIndex, BlobInfo, ElementType, GroupInfo};
pub use orchestrator::Trigger;
pub use reader::PbfDecoder;
