//! Slice markers
//!
//! A cut list is a sorted set of frame positions. Adjacent markers bound a
//! slice; a position between two markers selects the slice that contains it.

/// Sorted list of cut markers, in frames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutList {
    markers: Vec<usize>,
}

impl CutList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers in ascending order
    pub fn markers(&self) -> &[usize] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Insert a marker, returning its index
    ///
    /// Adding a marker that already exists leaves the list unchanged.
    pub fn add(&mut self, frame: usize) -> usize {
        match self.markers.binary_search(&frame) {
            Ok(index) => index,
            Err(index) => {
                self.markers.insert(index, frame);
                index
            }
        }
    }

    /// Move the marker at `index` to `frame`, returning its new index
    ///
    /// If another marker already sits at `frame` the two merge.
    pub fn move_marker(&mut self, index: usize, frame: usize) -> Option<usize> {
        self.remove(index)?;
        Some(self.add(frame))
    }

    /// Remove the marker at `index`, returning its frame
    pub fn remove(&mut self, index: usize) -> Option<usize> {
        (index < self.markers.len()).then(|| self.markers.remove(index))
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Index of the marker closest to `frame`
    pub fn nearest(&self, frame: usize) -> Option<usize> {
        let after = self.markers.partition_point(|&m| m < frame);
        let before = after.checked_sub(1);
        match (before, self.markers.get(after)) {
            (Some(b), Some(&a)) => {
                if frame - self.markers[b] <= a - frame {
                    Some(b)
                } else {
                    Some(after)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(_)) => Some(after),
            (None, None) => None,
        }
    }

    /// Slice `[start, end)` containing `frame`
    ///
    /// `None` when `frame` lies before the first marker or at/after the last.
    pub fn slice_at(&self, frame: usize) -> Option<(usize, usize)> {
        let after = self.markers.partition_point(|&m| m <= frame);
        if after == 0 || after == self.markers.len() {
            return None;
        }
        Some((self.markers[after - 1], self.markers[after]))
    }

    /// All slices between adjacent markers
    pub fn slices(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.markers.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuts(markers: &[usize]) -> CutList {
        let mut list = CutList::new();
        for &m in markers {
            list.add(m);
        }
        list
    }

    #[test]
    fn test_add_keeps_order() {
        let list = cuts(&[500, 100, 300, 100]);
        assert_eq!(list.markers(), &[100, 300, 500]);
    }

    #[test]
    fn test_slice_at() {
        let list = cuts(&[100, 300, 500]);
        assert_eq!(list.slice_at(50), None);
        assert_eq!(list.slice_at(100), Some((100, 300)));
        assert_eq!(list.slice_at(299), Some((100, 300)));
        assert_eq!(list.slice_at(300), Some((300, 500)));
        assert_eq!(list.slice_at(500), None);
        assert_eq!(list.slice_at(900), None);
    }

    #[test]
    fn test_single_marker_has_no_slices() {
        let list = cuts(&[100]);
        assert_eq!(list.slice_at(150), None);
        assert_eq!(list.slices().count(), 0);
    }

    #[test]
    fn test_move_marker_resorts() {
        let mut list = cuts(&[100, 300, 500]);
        assert_eq!(list.move_marker(0, 400), Some(1));
        assert_eq!(list.markers(), &[300, 400, 500]);
        assert_eq!(list.move_marker(7, 10), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut list = cuts(&[100, 300]);
        assert_eq!(list.remove(0), Some(100));
        assert_eq!(list.remove(5), None);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_nearest() {
        let list = cuts(&[100, 300]);
        assert_eq!(list.nearest(0), Some(0));
        assert_eq!(list.nearest(199), Some(0));
        assert_eq!(list.nearest(201), Some(1));
        assert_eq!(list.nearest(1000), Some(1));
        assert_eq!(CutList::new().nearest(5), None);
    }

    #[test]
    fn test_slices() {
        let list = cuts(&[0, 10, 25]);
        assert_eq!(list.slices().collect::<Vec<_>>(), vec![(0, 10), (10, 25)]);
    }
}
