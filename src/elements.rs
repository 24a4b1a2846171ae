//! OSM element types handed to a [`Consumer`], and the tag/delta decoding helpers that build them.

use crate::error::Error;
use crate::pbf;

use std::str;

/// A node: a single point, identified by `id`, at `(lat, lon)` in degrees.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: Vec<(&'a str, &'a str)>,
}

/// A way: an ordered sequence of node ids, with its own tags.
#[derive(Debug, Clone)]
pub struct Way<'a> {
    pub id: i64,
    pub refs: Vec<i64>,
    pub tags: Vec<(&'a str, &'a str)>,
}

/// The kind of element a [`Member`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl From<pbf::relation::MemberType> for MemberType {
    fn from(value: pbf::relation::MemberType) -> Self {
        match value {
            pbf::relation::MemberType::Node => MemberType::Node,
            pbf::relation::MemberType::Way => MemberType::Way,
            pbf::relation::MemberType::Relation => MemberType::Relation,
        }
    }
}

/// A single member of a [`Relation`]: the referenced element's id and type, with its role in the relation.
#[derive(Debug, Clone)]
pub struct Member<'a> {
    pub id: i64,
    pub member_type: MemberType,
    pub role: &'a str,
}

/// A relation: an ordered set of members (nodes, ways or other relations), with its own tags.
#[derive(Debug, Clone)]
pub struct Relation<'a> {
    pub id: i64,
    pub members: Vec<Member<'a>>,
    pub tags: Vec<(&'a str, &'a str)>,
}

/// Receives decoded OSM elements as a primitive block is decoded.
///
/// Implementations are invoked from worker threads, potentially multiple at once for distinct
/// blocks, so a `Consumer` must be safe to share across threads. The borrowed tag strings and
/// references in each element are only valid for the duration of the call.
pub trait Consumer: Send + Sync {
    fn on_node(&self, node: Node<'_>) {
        let _ = node;
    }

    fn on_way(&self, way: Way<'_>) {
        let _ = way;
    }

    fn on_relation(&self, relation: Relation<'_>) {
        let _ = relation;
    }
}

/// Generalized implementation for reading normal or densely encoded tags from string tables.
///
/// Use [`new_tag_reader`] or [`crate::dense::new_dense_tag_reader`] to construct it.
pub struct TagReader<'a, I>
where
    I: Iterator<Item = (Result<usize, Error>, Result<usize, Error>)>,
{
    string_table: &'a pbf::StringTable,
    iter: I,
}

impl<'a, I> TagReader<'a, I>
where
    I: Iterator<Item = (Result<usize, Error>, Result<usize, Error>)>,
{
    /// Constructs a `TagReader` directly from a string table and a key/value index iterator.
    pub fn from_parts(string_table: &'a pbf::StringTable, iter: I) -> Self {
        Self { string_table, iter }
    }
}

impl<'a, I> Iterator for TagReader<'a, I>
where
    I: Iterator<Item = (Result<usize, Error>, Result<usize, Error>)>,
{
    /// Tag as a (key, value) pair, containing either a string or an error if decoding has failed.
    type Item = (Result<&'a str, Error>, Result<&'a str, Error>);

    fn next(&mut self) -> Option<Self::Item> {
        match self.iter.next() {
            Some((key, value)) => {
                let decode_string = |index: usize| -> Result<&'a str, Error> {
                    resolve_string(self.string_table, index)
                };

                let key = match key {
                    Ok(key_idx) => decode_string(key_idx),
                    Err(error) => Err(error),
                };

                let value = match value {
                    Ok(value_idx) => decode_string(value_idx),
                    Err(error) => Err(error),
                };

                Some((key, value))
            }
            None => None,
        }
    }
}

fn resolve_string(string_table: &pbf::StringTable, index: usize) -> Result<&str, Error> {
    if let Some(bytes) = string_table.s.get(index) {
        str::from_utf8(bytes).map_err(|_| {
            crate::error::FormatError::InvalidData(format!("string at index {index} is not valid UTF-8")).into()
        })
    } else {
        Err(crate::error::FormatError::StringIndexOutOfRange {
            index,
            len: string_table.s.len(),
        }
        .into())
    }
}

/// Resolves a single string-table index, for callers that don't need a full `TagReader` (roles, etc).
pub fn resolve_index<'a>(string_table: &'a pbf::StringTable, index: i32) -> Result<&'a str, Error> {
    let index: usize = index
        .try_into()
        .map_err(|_| crate::error::FormatError::InvalidData(format!("string table index {index} is invalid")))?;
    resolve_string(string_table, index)
}

/// Constructs a new `TagReader` from key and value index slices, and a corresponding string table.
pub fn new_tag_reader<'a>(
    string_table: &'a pbf::StringTable,
    key_indices: &'a [u32],
    value_indices: &'a [u32],
) -> TagReader<'a, impl Iterator<Item = (Result<usize, Error>, Result<usize, Error>)> + 'a> {
    TagReader::from_parts(
        string_table,
        key_indices
            .iter()
            .map(|i| Ok(*i as usize))
            .zip(value_indices.iter().map(|i| Ok(*i as usize))),
    )
}

/// Eagerly collects a `TagReader` into owned-against-the-block `(key, value)` pairs, surfacing
/// the first decode error (if any) instead of a partial tag list.
pub fn collect_tags<'a, I>(reader: TagReader<'a, I>) -> Result<Vec<(&'a str, &'a str)>, Error>
where
    I: Iterator<Item = (Result<usize, Error>, Result<usize, Error>)>,
{
    reader
        .map(|(key, value)| Ok((key?, value?)))
        .collect()
}

/// Utility for reading delta-encoded values directly, like [`pbf::Way::refs`] and [`pbf::Relation::memids`].
pub struct DeltaValueReader<'a, T> {
    remaining: &'a [T],
    accumulated: T,
}

impl<'a, T> DeltaValueReader<'a, T>
where
    T: std::default::Default,
{
    /// Constructs a new `DeltaValueReader` from a slice of values.
    pub fn new(values: &'a [T]) -> Self {
        DeltaValueReader {
            remaining: values,
            accumulated: T::default(),
        }
    }
}

impl<T> Iterator for DeltaValueReader<'_, T>
where
    T: std::ops::AddAssign + std::clone::Clone,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((first, elements)) = self.remaining.split_first() {
            self.accumulated += first.clone();
            self.remaining = elements;
            Some(self.accumulated.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tag_reader_tests {
    use super::*;

    #[test]
    fn valid_input() {
        let key_vals = ["", "key1", "val1", "key2", "val2"];
        let string_table = pbf::StringTable {
            s: key_vals.iter().map(|s| s.as_bytes().to_vec()).collect(),
        };

        let key_indices = [1, 3];
        let value_indices = [2, 4];
        let mut reader = new_tag_reader(&string_table, &key_indices, &value_indices);

        assert!(matches!(reader.next(), Some((Ok("key1"), Ok("val1")))));
        assert!(matches!(reader.next(), Some((Ok("key2"), Ok("val2")))));

        assert!(reader.next().is_none());
    }

    #[test]
    fn out_of_range_index() {
        let string_table = pbf::StringTable { s: vec![b"only".to_vec()] };

        let key_indices = [5];
        let value_indices = [0];
        let mut reader = new_tag_reader(&string_table, &key_indices, &value_indices);

        let (key, _value) = reader.next().unwrap();
        assert!(key.is_err());
    }
}
