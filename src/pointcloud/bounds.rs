// SPDX-License-Identifier: GPL-3.0-only

//! Axis aligned bounding box of a camera's measured points

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: [f32; 3],
    max: [f32; 3],
    count: usize,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
            count: 0,
        }
    }
}

impl BoundingBox {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn extend(&mut self, p: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Points that went into the box
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn min(&self) -> Option<[f32; 3]> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<[f32; 3]> {
        (!self.is_empty()).then_some(self.max)
    }

    pub fn center(&self) -> Option<[f32; 3]> {
        if self.is_empty() {
            return None;
        }
        Some(std::array::from_fn(|i| (self.min[i] + self.max[i]) / 2.0))
    }

    pub fn size(&self) -> Option<[f32; 3]> {
        if self.is_empty() {
            return None;
        }
        Some(std::array::from_fn(|i| self.max[i] - self.min[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_and_reset() {
        let mut bb = BoundingBox::default();
        assert!(bb.center().is_none());
        bb.extend([1.0, -2.0, 3.0]);
        bb.extend([-1.0, 2.0, 5.0]);
        assert_eq!(bb.min(), Some([-1.0, -2.0, 3.0]));
        assert_eq!(bb.max(), Some([1.0, 2.0, 5.0]));
        assert_eq!(bb.center(), Some([0.0, 0.0, 4.0]));
        assert_eq!(bb.size(), Some([2.0, 4.0, 2.0]));
        assert_eq!(bb.count(), 2);
        bb.reset();
        assert!(bb.is_empty());
    }
}
