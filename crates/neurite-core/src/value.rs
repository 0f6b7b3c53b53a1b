//! Values carried across couplings.

use smallvec::SmallVec;
use std::fmt;

/// A value read from a producer attribute or written to a consumer attribute.
///
/// Vectors up to four components stay inline; longer vectors spill to
/// the heap transparently.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    /// A single scalar.
    Scalar(f64),
    /// A vector of scalars.
    Vector(SmallVec<[f64; 4]>),
}

impl AttributeValue {
    /// Collapse to a scalar. Vectors yield their first component, or
    /// `None` when empty.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Vector(v) => v.first().copied(),
        }
    }

    /// Number of scalar components.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(v) => v.len(),
        }
    }

    /// Whether this is an empty vector.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(SmallVec::from_vec(v))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Vector(v) => write!(f, "{:?}", v.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_collapse() {
        assert_eq!(AttributeValue::from(0.5).as_scalar(), Some(0.5));
        assert_eq!(AttributeValue::from(vec![2.0, 3.0]).as_scalar(), Some(2.0));
        assert_eq!(AttributeValue::from(Vec::new()).as_scalar(), None);
    }

    #[test]
    fn len_counts_components() {
        assert_eq!(AttributeValue::Scalar(1.0).len(), 1);
        let v = AttributeValue::from(vec![1.0; 6]);
        assert_eq!(v.len(), 6);
        assert!(!v.is_empty());
    }
}
