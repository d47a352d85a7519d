//! The tag-indexed element table carried by DIMSE messages and sequence items.

use crate::header::{DataElement, Tag};
use std::collections::btree_map::{self, BTreeMap};

/// A table of data elements indexed by tag.
///
/// Iteration follows ascending tag order,
/// which is the order in which the elements are encoded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataSet {
    elements: BTreeMap<Tag, DataElement>,
}

impl DataSet {
    /// Create an empty data set.
    pub fn new() -> Self {
        DataSet::default()
    }

    /// Insert an element, replacing and returning
    /// any previous element with the same tag.
    pub fn put(&mut self, element: DataElement) -> Option<DataElement> {
        self.elements.insert(element.tag(), element)
    }

    /// Fetch the element with the given tag.
    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.elements.get(&tag)
    }

    /// Remove the element with the given tag.
    pub fn remove(&mut self, tag: Tag) -> Option<DataElement> {
        self.elements.remove(&tag)
    }

    /// Whether an element with the given tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    /// Number of elements in the table.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the table has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> btree_map::Values<'_, Tag, DataElement> {
        self.elements.values()
    }

    /// Iterate over the tags present.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.elements.keys().copied()
    }
}

impl IntoIterator for DataSet {
    type Item = DataElement;
    type IntoIter = btree_map::IntoValues<Tag, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_values()
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataElement;
    type IntoIter = btree_map::Values<'a, Tag, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.values()
    }
}

impl FromIterator<DataElement> for DataSet {
    fn from_iter<T: IntoIterator<Item = DataElement>>(iter: T) -> Self {
        DataSet {
            elements: iter.into_iter().map(|e| (e.tag(), e)).collect(),
        }
    }
}

impl Extend<DataElement> for DataSet {
    fn extend<T: IntoIterator<Item = DataElement>>(&mut self, iter: T) {
        self.elements
            .extend(iter.into_iter().map(|e| (e.tag(), e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VR;

    #[test]
    fn replaces_elements_with_same_tag() {
        let mut ds = DataSet::new();
        assert!(ds
            .put(DataElement::new(Tag(0x0010, 0x0010), VR::PN, "Doe^John"))
            .is_none());
        let old = ds.put(DataElement::new(Tag(0x0010, 0x0010), VR::PN, "Roe^Jane"));
        assert_eq!(old.unwrap().to_str().unwrap(), "Doe^John");
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn iterates_in_tag_order() {
        let ds: DataSet = vec![
            DataElement::new(Tag(0x0020, 0x000D), VR::UI, "1.2.3"),
            DataElement::new(Tag(0x0008, 0x0052), VR::CS, "STUDY"),
            DataElement::new(Tag(0x0010, 0x0010), VR::PN, ""),
        ]
        .into_iter()
        .collect();
        let tags: Vec<_> = ds.tags().collect();
        assert_eq!(
            tags,
            vec![Tag(0x0008, 0x0052), Tag(0x0010, 0x0010), Tag(0x0020, 0x000D)]
        );
    }
}
