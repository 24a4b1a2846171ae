//! The block index: a catalogue of blob byte ranges and per-group element-id intervals.

use crate::error::{Error, FormatError};

use std::io::{Read, Write};
use std::sync::Mutex;

/// The kind of primitive group a [`GroupInfo`] summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    fn tag(self) -> u8 {
        match self {
            ElementType::Node => 0,
            ElementType::Way => 1,
            ElementType::Relation => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(ElementType::Node),
            1 => Ok(ElementType::Way),
            2 => Ok(ElementType::Relation),
            other => Err(FormatError::InvalidData(format!("unrecognized element type tag {other}")).into()),
        }
    }
}

/// Summary of one non-empty primitive group: its type and the `[low, high]` id interval it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInfo {
    pub element_type: ElementType,
    pub count: u64,
    pub low: i64,
    pub high: i64,
}

/// A single blob's position in the input, plus a summary of the groups it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub start: u64,
    pub size: u64,
    pub groups: Vec<GroupInfo>,
}

#[derive(Default)]
struct IndexState {
    blobs: Vec<BlobInfo>,
    breakpoints: Vec<u64>,
}

const FORMAT_TAG: &[u8; 4] = b"PBX1";

/// In-memory catalogue of blob ranges and element-id intervals, mutated under a single lock while
/// a parse is in progress and read freely afterwards.
///
/// Grouped into a single [`Mutex`] rather than field-level locking: the feeder appends blobs and
/// workers append groups to those same blobs, so a coarse lock keeps the two kinds of mutation
/// from interleaving into a torn `BlobInfo`.
#[derive(Default)]
pub struct BlobIndex {
    state: Mutex<IndexState>,
}

impl BlobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().blobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().blobs.len()
    }

    /// Appends a new, as-yet-empty blob entry and returns its index for later [`record_group`](Self::record_group) calls.
    pub fn push_blob(&self, start: u64, size: u64) -> usize {
        let mut state = self.state.lock().unwrap();
        let index = state.blobs.len();
        state.blobs.push(BlobInfo {
            start,
            size,
            groups: Vec::new(),
        });
        index
    }

    /// Attaches a decoded group's summary to the blob it came from.
    pub fn record_group(&self, blob_index: usize, group: GroupInfo) {
        let mut state = self.state.lock().unwrap();
        state.blobs[blob_index].groups.push(group);
    }

    /// A snapshot of the current breakpoint offsets, in ascending order.
    pub fn breakpoints(&self) -> Vec<u64> {
        self.state.lock().unwrap().breakpoints.clone()
    }

    /// Recomputes `breakpoints` as the start offsets of the first way-primary blob and the first
    /// relation-primary blob, dropping either that doesn't exist. Called automatically after
    /// [`read_from`](Self::read_from).
    pub fn set_breakpoints(&self) {
        let mut state = self.state.lock().unwrap();

        let first_way = first_blob_start_of(&state.blobs, ElementType::Way);
        let first_relation = first_blob_start_of(&state.blobs, ElementType::Relation);

        state.breakpoints = [first_way, first_relation].into_iter().flatten().collect();
    }

    /// Every blob start offset containing a group of `element_type` whose `[low, high]` interval
    /// contains `id`.
    pub fn blob_offsets(&self, element_type: ElementType, id: i64) -> Result<Vec<u64>, Error> {
        let state = self.state.lock().unwrap();

        let offsets: Vec<u64> = state
            .blobs
            .iter()
            .filter(|blob| {
                blob.groups
                    .iter()
                    .any(|g| g.element_type == element_type && g.low <= id && id <= g.high)
            })
            .map(|blob| blob.start)
            .collect();

        if offsets.is_empty() {
            Err(Error::NotFound)
        } else {
            Ok(offsets)
        }
    }

    /// The start offset of the first blob containing any group of `element_type`.
    pub fn first_offset_of_type(&self, element_type: ElementType) -> Result<u64, Error> {
        let state = self.state.lock().unwrap();
        first_blob_start_of(&state.blobs, element_type).ok_or(Error::NotFound)
    }

    /// Writes a self-describing, hand-rolled binary encoding of the index.
    pub fn write_to<W: Write>(&self, mut sink: W) -> Result<(), Error> {
        let state = self.state.lock().unwrap();

        sink.write_all(FORMAT_TAG)?;
        sink.write_all(&(state.blobs.len() as u64).to_be_bytes())?;

        for blob in &state.blobs {
            sink.write_all(&blob.start.to_be_bytes())?;
            sink.write_all(&blob.size.to_be_bytes())?;
            sink.write_all(&(blob.groups.len() as u32).to_be_bytes())?;

            for group in &blob.groups {
                sink.write_all(&[group.element_type.tag()])?;
                sink.write_all(&group.count.to_be_bytes())?;
                sink.write_all(&group.low.to_be_bytes())?;
                sink.write_all(&group.high.to_be_bytes())?;
            }
        }

        Ok(())
    }

    /// Reads an index previously written by [`write_to`](Self::write_to) and recomputes its breakpoints.
    pub fn read_from<R: Read>(mut source: R) -> Result<Self, Error> {
        let mut tag = [0u8; 4];
        source.read_exact(&mut tag)?;
        if &tag != FORMAT_TAG {
            return Err(FormatError::InvalidData("unrecognized index file format tag".to_string()).into());
        }

        let blob_count = read_u64(&mut source)?;
        let mut blobs = Vec::with_capacity(blob_count as usize);

        for _ in 0..blob_count {
            let start = read_u64(&mut source)?;
            let size = read_u64(&mut source)?;
            let group_count = read_u32(&mut source)?;

            let mut groups = Vec::with_capacity(group_count as usize);
            for _ in 0..group_count {
                let mut tag_byte = [0u8; 1];
                source.read_exact(&mut tag_byte)?;
                let element_type = ElementType::from_tag(tag_byte[0])?;
                let count = read_u64(&mut source)?;
                let low = read_i64(&mut source)?;
                let high = read_i64(&mut source)?;

                groups.push(GroupInfo {
                    element_type,
                    count,
                    low,
                    high,
                });
            }

            blobs.push(BlobInfo { start, size, groups });
        }

        let index = BlobIndex {
            state: Mutex::new(IndexState {
                blobs,
                breakpoints: Vec::new(),
            }),
        };
        index.set_breakpoints();

        Ok(index)
    }
}

fn first_blob_start_of(blobs: &[BlobInfo], element_type: ElementType) -> Option<u64> {
    blobs
        .iter()
        .find(|blob| blob.groups.iter().any(|g| g.element_type == element_type))
        .map(|blob| blob.start)
}

fn read_u64<R: Read>(source: &mut R) -> Result<u64, Error> {
    let mut buf = [0u8; 8];
    source.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_i64<R: Read>(source: &mut R) -> Result<i64, Error> {
    let mut buf = [0u8; 8];
    source.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn read_u32<R: Read>(source: &mut R) -> Result<u32, Error> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_offsets_finds_matching_interval() {
        let index = BlobIndex::new();
        let blob_idx = index.push_blob(0, 100);
        index.record_group(
            blob_idx,
            GroupInfo {
                element_type: ElementType::Node,
                count: 3,
                low: 10,
                high: 15,
            },
        );

        assert_eq!(index.blob_offsets(ElementType::Node, 12).unwrap(), vec![0]);
        assert!(matches!(index.blob_offsets(ElementType::Node, 999), Err(Error::NotFound)));
        assert!(matches!(index.blob_offsets(ElementType::Way, 12), Err(Error::NotFound)));
    }

    #[test]
    fn breakpoints_track_first_way_and_relation_blobs() {
        let index = BlobIndex::new();

        let node_blob = index.push_blob(0, 10);
        index.record_group(
            node_blob,
            GroupInfo {
                element_type: ElementType::Node,
                count: 1,
                low: 1,
                high: 1,
            },
        );

        let way_blob = index.push_blob(10, 10);
        index.record_group(
            way_blob,
            GroupInfo {
                element_type: ElementType::Way,
                count: 1,
                low: 1,
                high: 1,
            },
        );

        let relation_blob = index.push_blob(20, 10);
        index.record_group(
            relation_blob,
            GroupInfo {
                element_type: ElementType::Relation,
                count: 1,
                low: 1,
                high: 1,
            },
        );

        index.set_breakpoints();
        assert_eq!(index.breakpoints(), vec![10, 20]);
    }

    #[test]
    fn round_trips_through_write_and_read() {
        let index = BlobIndex::new();
        let blob_idx = index.push_blob(0, 50);
        index.record_group(
            blob_idx,
            GroupInfo {
                element_type: ElementType::Relation,
                count: 2,
                low: 5,
                high: 9,
            },
        );
        index.set_breakpoints();

        let mut buf = Vec::new();
        index.write_to(&mut buf).unwrap();

        let restored = BlobIndex::read_from(&buf[..]).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.breakpoints(), index.breakpoints());
        assert_eq!(
            restored.blob_offsets(ElementType::Relation, 7).unwrap(),
            index.blob_offsets(ElementType::Relation, 7).unwrap()
        );
    }

    #[test]
    fn rejects_unrecognized_format_tag() {
        let err = BlobIndex::read_from(&b"XXXX"[..]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::InvalidData(_))));
    }
}
