use super::{AnchorProducer, AnchorSet};
use crate::common::*;

/// Memoizes anchor sets per image size.
#[derive(Debug)]
pub struct AnchorCache<P> {
    producer: P,
    cache: DashMap<HW<usize>, Arc<AnchorSet>>,
}

impl<P> AnchorCache<P>
where
    P: AnchorProducer,
{
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            cache: DashMap::new(),
        }
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Get the anchors of the image size, generating them on first use.
    pub fn get(&self, image_size: &HW<usize>) -> Result<Arc<AnchorSet>> {
        if let Some(anchors) = self.cache.get(image_size) {
            return Ok(anchors.value().clone());
        }

        let anchors = Arc::new(self.producer.produce(image_size)?);
        let anchors = self
            .cache
            .entry(image_size.clone())
            .or_insert(anchors)
            .value()
            .clone();
        Ok(anchors)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
