use serde::{Deserialize, Serialize};

use crate::dtype::{DType, DTypeFamily, NAT};
use crate::form::{Form, FormField, IndexWidth, ListLayout, OptionLayout};
use crate::types::{StringEncoding, Type, TypeKind};

/// Flat scalar storage of a numeric leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "values", rename_all = "snake_case")]
pub enum Scalars {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Complex(Vec<[f64; 2]>),
    /// Datetime or timedelta ticks; [`NAT`] marks "not a time".
    Time(Vec<i64>),
}

impl Scalars {
    /// Empty storage matching the dtype family.
    pub fn empty(dtype: DType) -> Self {
        match dtype.family() {
            DTypeFamily::Bool => Scalars::Bool(Vec::new()),
            DTypeFamily::Signed => Scalars::Int(Vec::new()),
            DTypeFamily::Unsigned => Scalars::UInt(Vec::new()),
            DTypeFamily::Float => Scalars::Float(Vec::new()),
            DTypeFamily::Complex => Scalars::Complex(Vec::new()),
            DTypeFamily::Datetime | DTypeFamily::Timedelta => Scalars::Time(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Scalars::Bool(values) => values.len(),
            Scalars::Int(values) => values.len(),
            Scalars::UInt(values) => values.len(),
            Scalars::Float(values) => values.len(),
            Scalars::Complex(values) => values.len(),
            Scalars::Time(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when this storage can hold values of `dtype`.
    pub fn matches(&self, dtype: DType) -> bool {
        matches!(
            (self, dtype.family()),
            (Scalars::Bool(_), DTypeFamily::Bool)
                | (Scalars::Int(_), DTypeFamily::Signed)
                | (Scalars::UInt(_), DTypeFamily::Unsigned)
                | (Scalars::Float(_), DTypeFamily::Float)
                | (Scalars::Complex(_), DTypeFamily::Complex)
                | (Scalars::Time(_), DTypeFamily::Datetime | DTypeFamily::Timedelta)
        )
    }

    /// True when any entry is NaN (floats, complex) or NaT (times).
    pub fn any_nan_nat(&self) -> bool {
        match self {
            Scalars::Float(values) => values.iter().any(|value| value.is_nan()),
            Scalars::Complex(values) => values.iter().any(|[re, im]| re.is_nan() || im.is_nan()),
            Scalars::Time(values) => values.contains(&NAT),
            Scalars::Bool(_) | Scalars::Int(_) | Scalars::UInt(_) => false,
        }
    }
}

/// Index buffers of a list or string node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum ListIndex {
    Offsets {
        width: IndexWidth,
        offsets: Vec<i64>,
    },
    StartsStops {
        width: IndexWidth,
        starts: Vec<i64>,
        stops: Vec<i64>,
    },
}

impl ListIndex {
    /// Contiguous index from `offsets`, re-encoded in `layout`.
    pub fn from_offsets(layout: ListLayout, offsets: Vec<i64>) -> Self {
        match layout {
            ListLayout::Offsets { width } => ListIndex::Offsets { width, offsets },
            ListLayout::StartsStops { width } => {
                let starts = offsets.iter().take(offsets.len().saturating_sub(1)).copied().collect();
                let stops = offsets.iter().skip(1).copied().collect();
                ListIndex::StartsStops {
                    width,
                    starts,
                    stops,
                }
            }
        }
    }

    pub fn layout(&self) -> ListLayout {
        match self {
            ListIndex::Offsets { width, .. } => ListLayout::Offsets { width: *width },
            ListIndex::StartsStops { width, .. } => ListLayout::StartsStops { width: *width },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListIndex::Offsets { offsets, .. } => offsets.len().saturating_sub(1),
            ListIndex::StartsStops { starts, .. } => starts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(start, stop)` of list `i`, if present.
    pub fn bounds(&self, i: usize) -> Option<(i64, i64)> {
        match self {
            ListIndex::Offsets { offsets, .. } => Some((*offsets.get(i)?, *offsets.get(i + 1)?)),
            ListIndex::StartsStops { starts, stops, .. } => Some((*starts.get(i)?, *stops.get(i)?)),
        }
    }
}

/// Missing-value buffers of an option node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum OptionMask {
    Indexed {
        width: IndexWidth,
        index: Vec<i64>,
    },
    ByteMasked {
        valid_when: bool,
        mask: Vec<bool>,
    },
    BitMasked {
        valid_when: bool,
        lsb_order: bool,
        length: usize,
        mask: Vec<u8>,
    },
    Unmasked,
}

impl OptionMask {
    /// Encode per-entry validity (`true` = present) in `layout`.
    ///
    /// `Unmasked` cannot express missing entries; callers must only pass
    /// all-valid flags for it.
    pub fn from_validity(layout: OptionLayout, valid: &[bool]) -> Self {
        match layout {
            OptionLayout::Indexed { width } => OptionMask::Indexed {
                width,
                index: valid
                    .iter()
                    .enumerate()
                    .map(|(i, ok)| if *ok { i as i64 } else { -1 })
                    .collect(),
            },
            OptionLayout::ByteMasked { valid_when } => OptionMask::ByteMasked {
                valid_when,
                mask: valid.iter().map(|ok| *ok == valid_when).collect(),
            },
            OptionLayout::BitMasked {
                valid_when,
                lsb_order,
            } => {
                let mut mask = vec![0_u8; valid.len().div_ceil(8)];
                for (i, ok) in valid.iter().enumerate() {
                    if *ok == valid_when {
                        let bit = if lsb_order { i % 8 } else { 7 - i % 8 };
                        mask[i / 8] |= 1 << bit;
                    }
                }
                OptionMask::BitMasked {
                    valid_when,
                    lsb_order,
                    length: valid.len(),
                    mask,
                }
            }
            OptionLayout::Unmasked => OptionMask::Unmasked,
        }
    }

    pub fn layout(&self) -> OptionLayout {
        match self {
            OptionMask::Indexed { width, .. } => OptionLayout::Indexed { width: *width },
            OptionMask::ByteMasked { valid_when, .. } => OptionLayout::ByteMasked {
                valid_when: *valid_when,
            },
            OptionMask::BitMasked {
                valid_when,
                lsb_order,
                ..
            } => OptionLayout::BitMasked {
                valid_when: *valid_when,
                lsb_order: *lsb_order,
            },
            OptionMask::Unmasked => OptionLayout::Unmasked,
        }
    }

    /// Whether entry `i` is present. `None` past the end of the mask, or
    /// always for `Unmasked`, whose length is the content's.
    pub fn is_valid(&self, i: usize) -> Option<bool> {
        match self {
            OptionMask::Indexed { index, .. } => index.get(i).map(|entry| *entry >= 0),
            OptionMask::ByteMasked { valid_when, mask } => {
                mask.get(i).map(|byte| *byte == *valid_when)
            }
            OptionMask::BitMasked {
                valid_when,
                lsb_order,
                length,
                mask,
            } => {
                if i >= *length {
                    return None;
                }
                let bit = if *lsb_order { i % 8 } else { 7 - i % 8 };
                let set = mask.get(i / 8).map(|byte| byte & (1 << bit) != 0)?;
                Some(set == *valid_when)
            }
            OptionMask::Unmasked => None,
        }
    }
}

/// Concrete array data conforming to a [`Form`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Value {
    Numpy {
        dtype: DType,
        data: Scalars,
    },
    List {
        index: ListIndex,
        content: Box<Value>,
    },
    Regular {
        size: usize,
        length: usize,
        content: Box<Value>,
    },
    Option {
        mask: OptionMask,
        content: Box<Value>,
    },
    Record {
        length: usize,
        fields: Vec<ValueField>,
    },
    Union {
        index_width: IndexWidth,
        tags: Vec<i8>,
        index: Vec<i64>,
        variants: Vec<Value>,
    },
    String {
        encoding: StringEncoding,
        index: ListIndex,
        bytes: Vec<u8>,
    },
}

/// Named record field of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueField {
    pub name: String,
    pub value: Value,
}

impl Value {
    /// Number of entries at the outermost level.
    pub fn len(&self) -> usize {
        match self {
            Value::Numpy { data, .. } => data.len(),
            Value::List { index, .. } | Value::String { index, .. } => index.len(),
            Value::Regular { length, .. } | Value::Record { length, .. } => *length,
            Value::Option { mask, content } => match mask {
                OptionMask::Indexed { index, .. } => index.len(),
                OptionMask::ByteMasked { mask, .. } => mask.len(),
                OptionMask::BitMasked { length, .. } => *length,
                OptionMask::Unmasked => content.len(),
            },
            Value::Union { tags, .. } => tags.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Value::Numpy { .. } => TypeKind::Leaf,
            Value::List { .. } => TypeKind::List,
            Value::Regular { .. } => TypeKind::Regular,
            Value::Option { .. } => TypeKind::Option,
            Value::Record { .. } => TypeKind::Record,
            Value::Union { .. } => TypeKind::Union,
            Value::String { .. } => TypeKind::String,
        }
    }

    pub fn children(&self) -> Vec<&Value> {
        match self {
            Value::Numpy { .. } | Value::String { .. } => Vec::new(),
            Value::List { content, .. } | Value::Regular { content, .. } | Value::Option { content, .. } => {
                vec![content.as_ref()]
            }
            Value::Record { fields, .. } => fields.iter().map(|field| &field.value).collect(),
            Value::Union { variants, .. } => variants.iter().collect(),
        }
    }

    /// The layout this value is stored in.
    pub fn form(&self) -> Form {
        match self {
            Value::Numpy { dtype, .. } => Form::Numpy { dtype: *dtype },
            Value::List { index, content } => Form::List {
                layout: index.layout(),
                content: Box::new(content.form()),
            },
            Value::Regular { size, content, .. } => Form::Regular {
                size: *size,
                content: Box::new(content.form()),
            },
            Value::Option { mask, content } => Form::Option {
                layout: mask.layout(),
                content: Box::new(content.form()),
            },
            Value::Record { fields, .. } => Form::Record {
                fields: fields
                    .iter()
                    .map(|field| FormField {
                        name: field.name.clone(),
                        form: field.value.form(),
                    })
                    .collect(),
            },
            Value::Union {
                index_width,
                variants,
                ..
            } => Form::Union {
                index: *index_width,
                variants: variants.iter().map(Value::form).collect(),
            },
            Value::String {
                encoding, index, ..
            } => Form::String {
                encoding: *encoding,
                layout: index.layout(),
            },
        }
    }

    pub fn ty(&self) -> Type {
        self.form().project()
    }

    /// Number of missing entries in this node's own mask.
    pub fn null_count(&self) -> usize {
        let Value::Option { mask, .. } = self else {
            return 0;
        };
        (0..self.len())
            .filter(|i| mask.is_valid(*i) == Some(false))
            .count()
    }

    /// True when any option node in the tree has a missing entry.
    pub fn has_nulls(&self) -> bool {
        self.null_count() > 0 || self.children().into_iter().any(Value::has_nulls)
    }

    /// True when any leaf holds NaN or NaT.
    pub fn any_nan_nat(&self) -> bool {
        match self {
            Value::Numpy { data, .. } => data.any_nan_nat(),
            other => other.children().into_iter().any(Value::any_nan_nat),
        }
    }

    /// Every numeric leaf in the tree, pre-order.
    pub fn leaves(&self) -> Vec<(&DType, &Scalars)> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Value::Numpy { dtype, data } = node {
                out.push((dtype, data));
            }
            stack.extend(node.children().into_iter().rev());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_mask_round_trips_validity() {
        let valid = [true, false, true, true, false, true, true, true, false, true];
        for lsb_order in [true, false] {
            for valid_when in [true, false] {
                let mask = OptionMask::from_validity(
                    OptionLayout::BitMasked {
                        valid_when,
                        lsb_order,
                    },
                    &valid,
                );
                let decoded: Vec<bool> = (0..valid.len())
                    .map(|i| mask.is_valid(i).unwrap())
                    .collect();
                assert_eq!(decoded, valid);
                assert_eq!(mask.is_valid(valid.len()), None);
            }
        }
    }

    #[test]
    fn starts_stops_derive_from_offsets() {
        let index = ListIndex::from_offsets(
            ListLayout::StartsStops {
                width: IndexWidth::I32,
            },
            vec![0, 2, 2, 5],
        );
        assert_eq!(index.len(), 3);
        assert_eq!(index.bounds(1), Some((2, 2)));
        assert_eq!(index.bounds(2), Some((2, 5)));
        assert_eq!(index.bounds(3), None);
    }

    #[test]
    fn null_count_reads_the_mask() {
        let value = Value::Option {
            mask: OptionMask::from_validity(
                OptionLayout::Indexed {
                    width: IndexWidth::I64,
                },
                &[true, false, false],
            ),
            content: Box::new(Value::Numpy {
                dtype: DType::Int32,
                data: Scalars::Int(vec![1, 2, 3]),
            }),
        };
        assert_eq!(value.len(), 3);
        assert_eq!(value.null_count(), 2);
        assert!(value.has_nulls());
    }
}
