use crate::{common::*, GroundTruth, Slot};

/// Ground truth records padded to a fixed capacity.
///
/// On the array boundary it is a pair of `[capacity, 5]` boxes
/// `(y1, x1, y2, x2, tag)` and `[capacity, 2]` classes `(class, tag)`,
/// where the tag is `0` for padding rows and non-zero for real rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedLabels {
    slots: Vec<Slot<GroundTruth>>,
}

impl PaddedLabels {
    /// Pad the records up to the capacity. Records labelled as background
    /// are rejected.
    pub fn new<I>(labels: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = GroundTruth>,
    {
        let mut slots: Vec<_> = labels.into_iter().map(Slot::Valid).collect();
        if let Some(index) = slots
            .iter()
            .position(|slot| matches!(slot, Slot::Valid(label) if label.class == 0))
        {
            bail!("class 0 is reserved for the background, but found at record {}", index);
        }
        ensure!(
            slots.len() <= capacity,
            "the number of labels ({}) exceeds the capacity ({})",
            slots.len(),
            capacity
        );
        slots.resize(capacity, Slot::Padding);
        Ok(Self { slots })
    }

    /// Parse the padded box and class arrays.
    pub fn from_arrays(boxes: ArrayView2<f64>, classes: ArrayView2<i64>) -> Result<Self> {
        ensure!(
            boxes.ncols() == 5,
            "expect ground truth boxes in shape [n, 5], but get {:?}",
            boxes.shape()
        );
        ensure!(
            classes.ncols() == 2,
            "expect ground truth classes in shape [n, 2], but get {:?}",
            classes.shape()
        );
        ensure!(
            boxes.nrows() == classes.nrows(),
            "the number of boxes ({}) and classes ({}) mismatch",
            boxes.nrows(),
            classes.nrows()
        );

        let slots = boxes
            .outer_iter()
            .zip(classes.outer_iter())
            .enumerate()
            .map(|(index, (bbox, class))| {
                let box_valid = bbox[4] != 0.0;
                let class_valid = class[1] != 0;
                ensure!(
                    box_valid == class_valid,
                    "the box and class tags disagree at row {}",
                    index
                );
                if !box_valid {
                    return Ok(Slot::Padding);
                }

                let class_id = usize::try_from(class[0])
                    .map_err(|_| format_err!("negative class id {} at row {}", class[0], index))?;
                let label = GroundTruth::try_new([bbox[0], bbox[1], bbox[2], bbox[3]], class_id)
                    .with_context(|| format!("invalid ground truth at row {}", index))?;
                if label.rect.area() <= 0.0 {
                    warn!("the ground truth box {:?} at row {} has zero area", label.rect, index);
                }
                Ok(Slot::Valid(label))
            })
            .collect::<Result<_>>()?;

        Ok(Self { slots })
    }

    /// Build the `[capacity, 5]` box array and the `[capacity, 2]` class array.
    pub fn to_arrays(&self) -> (Array2<f64>, Array2<i64>) {
        let capacity = self.capacity();
        let mut boxes = Array2::zeros((capacity, 5));
        let mut classes = Array2::zeros((capacity, 2));

        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.valid()?, slot.tag())))
            .for_each(|(index, label, tag)| {
                let [t, l, b, r] = label.rect.tlbr();
                boxes
                    .slice_mut(s![index, ..])
                    .assign(&ndarray::arr1(&[t, l, b, r, tag as f64]));
                classes[[index, 0]] = label.class as i64;
                classes[[index, 1]] = tag;
            });

        (boxes, classes)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot<GroundTruth>] {
        &self.slots
    }

    /// Iterate over the real records in slot order.
    pub fn iter_valid(&self) -> impl Iterator<Item = &GroundTruth> {
        self.slots.iter().filter_map(Slot::valid)
    }

    /// Collect the real records, dropping padding.
    pub fn strip_padding(&self) -> Vec<GroundTruth> {
        self.iter_valid().cloned().collect()
    }
}

/// Candidate boxes padded to a fixed capacity, in `[capacity, 5]`
/// `(y1, x1, y2, x2, tag)` layout on the array boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBoxes {
    slots: Vec<Slot<TLBR<f64>>>,
}

impl PaddedBoxes {
    pub fn new<I>(boxes: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = TLBR<f64>>,
    {
        let mut slots: Vec<_> = boxes.into_iter().map(Slot::Valid).collect();
        ensure!(
            slots.len() <= capacity,
            "the number of boxes ({}) exceeds the capacity ({})",
            slots.len(),
            capacity
        );
        slots.resize(capacity, Slot::Padding);
        Ok(Self { slots })
    }

    pub fn from_array(boxes: ArrayView2<f64>) -> Result<Self> {
        ensure!(
            boxes.ncols() == 5,
            "expect boxes in shape [n, 5], but get {:?}",
            boxes.shape()
        );

        let slots = boxes
            .outer_iter()
            .enumerate()
            .map(|(index, row)| {
                if row[4] == 0.0 {
                    return Ok(Slot::Padding);
                }
                let tlbr = [row[0], row[1], row[2], row[3]];
                ensure!(
                    tlbr.iter().all(|val| val.is_finite()),
                    "box coordinates must be finite at row {}",
                    index
                );
                let rect = TLBR::try_from_tlbr(tlbr)
                    .with_context(|| format!("invalid box at row {}", index))?;
                Ok(Slot::Valid(rect))
            })
            .collect::<Result<_>>()?;

        Ok(Self { slots })
    }

    pub fn to_array(&self) -> Array2<f64> {
        let mut array = Array2::zeros((self.capacity(), 5));
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index, slot.valid()?, slot.tag())))
            .for_each(|(index, rect, tag)| {
                let [t, l, b, r] = rect.tlbr();
                array
                    .slice_mut(s![index, ..])
                    .assign(&ndarray::arr1(&[t, l, b, r, tag as f64]));
            });
        array
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot<TLBR<f64>>] {
        &self.slots
    }

    pub fn strip_padding(&self) -> Vec<TLBR<f64>> {
        self.slots.iter().filter_map(Slot::valid).cloned().collect()
    }
}
