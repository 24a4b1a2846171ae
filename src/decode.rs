//! Expands a decoded `PrimitiveBlock` into element callbacks on a [`Consumer`].

use crate::dense::{new_dense_tag_reader, DenseNodeReader};
use crate::elements::{self, Consumer, DeltaValueReader, Member, MemberType, Node, Relation, Way};
use crate::error::{Error, FormatError};
use crate::index::{ElementType, GroupInfo};
use crate::pbf;
use crate::util::normalize_coord;

/// Decodes every primitive group in `block`, invoking the matching [`Consumer`] method for each
/// element. When `collect_groups` is set, returns one [`GroupInfo`] per non-empty group, in file
/// order, for the caller to attach to the owning blob's index entry.
pub fn decode_primitive_block<C: Consumer>(
    block: &pbf::PrimitiveBlock,
    consumer: &C,
    collect_groups: bool,
) -> Result<Vec<GroupInfo>, Error> {
    let mut groups = Vec::new();

    for group in &block.primitivegroup {
        if let Some(dense) = &group.dense {
            if let Some(info) = decode_dense_group(block, dense, consumer, collect_groups)? {
                groups.push(info);
            }
        } else if !group.ways.is_empty() {
            groups.extend(decode_way_group(block, &group.ways, consumer, collect_groups)?);
        } else if !group.relations.is_empty() {
            groups.extend(decode_relation_group(block, &group.relations, consumer, collect_groups)?);
        } else if !group.nodes.is_empty() {
            return Err(Error::UnsupportedFeature("legacy Node primitives".to_string()));
        } else {
            return Err(FormatError::UnrecognizedPrimitiveGroup.into());
        }
    }

    Ok(groups)
}

fn decode_dense_group<C: Consumer>(
    block: &pbf::PrimitiveBlock,
    dense: &pbf::DenseNodes,
    consumer: &C,
    collect_groups: bool,
) -> Result<Option<GroupInfo>, Error> {
    let reader = DenseNodeReader::new(dense)?;

    let mut count: u64 = 0;
    let mut low = i64::MAX;
    let mut high = i64::MIN;

    for node in reader {
        let node = node?;
        let (lat, lon) = normalize_coord(node.lat, node.lon, block);
        let tags = elements::collect_tags(new_dense_tag_reader(&block.stringtable, node.key_value_indices))?;

        if collect_groups {
            count += 1;
            low = low.min(node.id);
            high = high.max(node.id);
        }

        consumer.on_node(Node {
            id: node.id,
            lat,
            lon,
            tags,
        });
    }

    if collect_groups && count > 0 {
        Ok(Some(GroupInfo {
            element_type: ElementType::Node,
            count,
            low,
            high,
        }))
    } else {
        Ok(None)
    }
}

fn decode_way_group<C: Consumer>(
    block: &pbf::PrimitiveBlock,
    ways: &[pbf::Way],
    consumer: &C,
    collect_groups: bool,
) -> Result<Option<GroupInfo>, Error> {
    let mut count: u64 = 0;
    let mut low = i64::MAX;
    let mut high = i64::MIN;

    for way in ways {
        let id = way.id;
        let refs = DeltaValueReader::new(&way.refs).collect();
        let tags = elements::collect_tags(elements::new_tag_reader(&block.stringtable, &way.keys, &way.vals))?;

        if collect_groups {
            count += 1;
            low = low.min(id);
            high = high.max(id);
        }

        consumer.on_way(Way { id, refs, tags });
    }

    if collect_groups && count > 0 {
        Ok(Some(GroupInfo {
            element_type: ElementType::Way,
            count,
            low,
            high,
        }))
    } else {
        Ok(None)
    }
}

fn decode_relation_group<C: Consumer>(
    block: &pbf::PrimitiveBlock,
    relations: &[pbf::Relation],
    consumer: &C,
    collect_groups: bool,
) -> Result<Option<GroupInfo>, Error> {
    let mut count: u64 = 0;
    let mut low = i64::MAX;
    let mut high = i64::MIN;

    for relation in relations {
        let id = relation.id;

        if relation.memids.len() != relation.types.len() || relation.memids.len() != relation.roles_sid.len() {
            return Err(FormatError::InvalidData(format!(
                "relation {id} has mismatched memids/types/roles_sid lengths: {}/{}/{}",
                relation.memids.len(),
                relation.types.len(),
                relation.roles_sid.len()
            ))
            .into());
        }

        let member_ids = DeltaValueReader::new(&relation.memids);
        let mut members = Vec::with_capacity(relation.memids.len());

        for (member_id, (raw_type, role_idx)) in member_ids.zip(relation.types.iter().zip(relation.roles_sid.iter())) {
            let member_type = pbf::relation::MemberType::from_i32(*raw_type).ok_or_else(|| {
                FormatError::InvalidData(format!("relation {id} has an unrecognized member type {raw_type}"))
            })?;
            let role = elements::resolve_index(&block.stringtable, *role_idx)?;

            members.push(Member {
                id: member_id,
                member_type: MemberType::from(member_type),
                role,
            });
        }

        let tags = elements::collect_tags(elements::new_tag_reader(&block.stringtable, &relation.keys, &relation.vals))?;

        if collect_groups {
            count += 1;
            low = low.min(id);
            high = high.max(id);
        }

        consumer.on_relation(Relation { id, members, tags });
    }

    if collect_groups && count > 0 {
        Ok(Some(GroupInfo {
            element_type: ElementType::Relation,
            count,
            low,
            high,
        }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        nodes: Mutex<Vec<(i64, f64, f64)>>,
        ways: Mutex<Vec<(i64, Vec<i64>)>>,
        relations: Mutex<Vec<(i64, usize)>>,
    }

    impl Consumer for Recorder {
        fn on_node(&self, node: Node<'_>) {
            self.nodes.lock().unwrap().push((node.id, node.lat, node.lon));
        }

        fn on_way(&self, way: Way<'_>) {
            self.ways.lock().unwrap().push((way.id, way.refs));
        }

        fn on_relation(&self, relation: Relation<'_>) {
            self.relations.lock().unwrap().push((relation.id, relation.members.len()));
        }
    }

    fn empty_block() -> pbf::PrimitiveBlock {
        pbf::PrimitiveBlock {
            stringtable: pbf::StringTable::default(),
            primitivegroup: Vec::new(),
            granularity: None,
            date_granularity: None,
            lat_offset: None,
            lon_offset: None,
        }
    }

    #[test]
    fn dense_nodes_delta_decode_and_report_group_info() {
        let mut block = empty_block();
        block.primitivegroup.push(pbf::PrimitiveGroup {
            dense: Some(pbf::DenseNodes {
                id: vec![10, 2, 3],
                lat: vec![1, 0, 0],
                lon: vec![1, 0, 0],
                denseinfo: None,
                keys_vals: Vec::new(),
            }),
            ..Default::default()
        });

        let consumer = Recorder::default();
        let groups = decode_primitive_block(&block, &consumer, true).unwrap();

        let nodes = consumer.nodes.lock().unwrap();
        assert_eq!(nodes.iter().map(|(id, _, _)| *id).collect::<Vec<_>>(), vec![10, 12, 15]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].element_type, ElementType::Node);
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].low, 10);
        assert_eq!(groups[0].high, 15);
    }

    #[test]
    fn unrecognized_group_is_an_error() {
        let mut block = empty_block();
        block.primitivegroup.push(pbf::PrimitiveGroup::default());

        let consumer = Recorder::default();
        assert!(decode_primitive_block(&block, &consumer, false).is_err());
    }

    #[test]
    fn legacy_nodes_are_unsupported() {
        let mut block = empty_block();
        block.primitivegroup.push(pbf::PrimitiveGroup {
            nodes: vec![pbf::Node {
                id: 1,
                ..Default::default()
            }],
            ..Default::default()
        });

        let consumer = Recorder::default();
        let err = decode_primitive_block(&block, &consumer, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }
}
