//! Flat buffer export and import.
//!
//! Nodes are numbered in pre-order and every buffer is keyed as
//! `node{N}-{role}`. Each node stores its length under `node{N}-length`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::form::{Form, ListLayout, OptionLayout};
use crate::layout::validity_error;
use crate::value::{ListIndex, OptionMask, Scalars, Value, ValueField};

/// One named buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "buffer", content = "data", rename_all = "snake_case")]
pub enum Buffer {
    Length(usize),
    Index(Vec<i64>),
    Tags(Vec<i8>),
    Mask(Vec<u8>),
    Bytes(Vec<u8>),
    Scalars(Scalars),
}

/// A form plus the buffers that materialize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSet {
    pub form: Form,
    pub length: usize,
    pub buffers: BTreeMap<String, Buffer>,
}

impl BufferSet {
    /// Materialize the value these buffers describe.
    pub fn materialize(&self) -> Result<Value> {
        from_buffers(&self.form, self.length, &self.buffers)
    }
}

fn key(node: usize, role: &str) -> String {
    format!("node{node}-{role}")
}

/// Decompose `value` into its form and flat buffers.
pub fn to_buffers(value: &Value) -> BufferSet {
    let mut buffers = BTreeMap::new();
    let mut next = 0;
    export(value, &mut next, &mut buffers);
    BufferSet {
        form: value.form(),
        length: value.len(),
        buffers,
    }
}

fn export(value: &Value, next: &mut usize, out: &mut BTreeMap<String, Buffer>) {
    let node = *next;
    *next += 1;
    out.insert(key(node, "length"), Buffer::Length(value.len()));
    match value {
        Value::Numpy { data, .. } => {
            out.insert(key(node, "data"), Buffer::Scalars(data.clone()));
        }
        Value::List { index, content } => {
            export_list_index(node, index, out);
            export(content, next, out);
        }
        Value::Regular { content, .. } => export(content, next, out),
        Value::Option { mask, content } => {
            match mask {
                OptionMask::Indexed { index, .. } => {
                    out.insert(key(node, "index"), Buffer::Index(index.clone()));
                }
                OptionMask::ByteMasked { mask, .. } => {
                    let bytes = mask.iter().map(|set| u8::from(*set)).collect();
                    out.insert(key(node, "mask"), Buffer::Mask(bytes));
                }
                OptionMask::BitMasked { mask, .. } => {
                    out.insert(key(node, "mask"), Buffer::Mask(mask.clone()));
                }
                OptionMask::Unmasked => {}
            }
            export(content, next, out);
        }
        Value::Record { fields, .. } => {
            for field in fields {
                export(&field.value, next, out);
            }
        }
        Value::Union {
            tags,
            index,
            variants,
            ..
        } => {
            out.insert(key(node, "tags"), Buffer::Tags(tags.clone()));
            out.insert(key(node, "index"), Buffer::Index(index.clone()));
            for variant in variants {
                export(variant, next, out);
            }
        }
        Value::String { index, bytes, .. } => {
            export_list_index(node, index, out);
            out.insert(key(node, "bytes"), Buffer::Bytes(bytes.clone()));
        }
    }
}

fn export_list_index(node: usize, index: &ListIndex, out: &mut BTreeMap<String, Buffer>) {
    match index {
        ListIndex::Offsets { offsets, .. } => {
            out.insert(key(node, "offsets"), Buffer::Index(offsets.clone()));
        }
        ListIndex::StartsStops { starts, stops, .. } => {
            out.insert(key(node, "starts"), Buffer::Index(starts.clone()));
            out.insert(key(node, "stops"), Buffer::Index(stops.clone()));
        }
    }
}

/// Rebuild a value of `length` entries from `form` and `buffers`, then
/// check its layout.
pub fn from_buffers(
    form: &Form,
    length: usize,
    buffers: &BTreeMap<String, Buffer>,
) -> Result<Value> {
    form.validate()?;
    let mut reader = Reader {
        buffers,
        next: 0,
    };
    let value = reader.import(form)?;
    if value.len() != length {
        return Err(Error::InvalidBuffers(format!(
            "expected length {length}, buffers describe {}",
            value.len()
        )));
    }
    if let Some(violation) = validity_error(&value) {
        return Err(Error::InvalidValue(violation));
    }
    Ok(value)
}

struct Reader<'a> {
    buffers: &'a BTreeMap<String, Buffer>,
    next: usize,
}

impl<'a> Reader<'a> {
    fn take(&self, node: usize, role: &str) -> Result<&'a Buffer> {
        let name = key(node, role);
        self.buffers
            .get(&name)
            .ok_or_else(|| Error::InvalidBuffers(format!("missing buffer {name}")))
    }

    fn length(&self, node: usize) -> Result<usize> {
        match self.take(node, "length")? {
            Buffer::Length(length) => Ok(*length),
            _ => Err(mistyped(node, "length")),
        }
    }

    fn index(&self, node: usize, role: &str) -> Result<Vec<i64>> {
        match self.take(node, role)? {
            Buffer::Index(index) => Ok(index.clone()),
            _ => Err(mistyped(node, role)),
        }
    }

    fn list_index(&self, node: usize, layout: ListLayout, length: usize) -> Result<ListIndex> {
        let index = match layout {
            ListLayout::Offsets { width } => {
                let needed = length.checked_add(1).ok_or_else(|| {
                    Error::InvalidBuffers(format!(
                        "buffer {} length {length} overflows",
                        key(node, "length")
                    ))
                })?;
                let mut offsets = self.index(node, "offsets")?;
                if offsets.len() < needed {
                    return Err(short(node, "offsets", offsets.len(), needed));
                }
                offsets.truncate(needed);
                ListIndex::Offsets { width, offsets }
            }
            ListLayout::StartsStops { width } => {
                let mut starts = self.index(node, "starts")?;
                let mut stops = self.index(node, "stops")?;
                if starts.len() < length {
                    return Err(short(node, "starts", starts.len(), length));
                }
                if stops.len() < length {
                    return Err(short(node, "stops", stops.len(), length));
                }
                starts.truncate(length);
                stops.truncate(length);
                ListIndex::StartsStops {
                    width,
                    starts,
                    stops,
                }
            }
        };
        Ok(index)
    }

    fn import(&mut self, form: &Form) -> Result<Value> {
        let node = self.next;
        self.next += 1;
        let length = self.length(node)?;
        let value = match form {
            Form::Numpy { dtype } => {
                let Buffer::Scalars(data) = self.take(node, "data")? else {
                    return Err(mistyped(node, "data"));
                };
                if !data.matches(*dtype) {
                    return Err(mistyped(node, "data"));
                }
                if data.len() != length {
                    return Err(Error::InvalidBuffers(format!(
                        "{} holds {} scalars, length is {length}",
                        key(node, "data"),
                        data.len()
                    )));
                }
                Value::Numpy {
                    dtype: *dtype,
                    data: data.clone(),
                }
            }
            Form::List { layout, content } => {
                let index = self.list_index(node, *layout, length)?;
                Value::List {
                    index,
                    content: Box::new(self.import(content)?),
                }
            }
            Form::Regular { size, content } => Value::Regular {
                size: *size,
                length,
                content: Box::new(self.import(content)?),
            },
            Form::Option { layout, content } => {
                let mask = match layout {
                    OptionLayout::Indexed { width } => {
                        let mut index = self.index(node, "index")?;
                        if index.len() < length {
                            return Err(short(node, "index", index.len(), length));
                        }
                        index.truncate(length);
                        OptionMask::Indexed {
                            width: *width,
                            index,
                        }
                    }
                    OptionLayout::ByteMasked { valid_when } => {
                        let Buffer::Mask(bytes) = self.take(node, "mask")? else {
                            return Err(mistyped(node, "mask"));
                        };
                        if bytes.len() < length {
                            return Err(short(node, "mask", bytes.len(), length));
                        }
                        OptionMask::ByteMasked {
                            valid_when: *valid_when,
                            mask: bytes[..length].iter().map(|byte| *byte != 0).collect(),
                        }
                    }
                    OptionLayout::BitMasked {
                        valid_when,
                        lsb_order,
                    } => {
                        let Buffer::Mask(bytes) = self.take(node, "mask")? else {
                            return Err(mistyped(node, "mask"));
                        };
                        let needed = length.div_ceil(8);
                        if bytes.len() < needed {
                            return Err(short(node, "mask", bytes.len(), needed));
                        }
                        OptionMask::BitMasked {
                            valid_when: *valid_when,
                            lsb_order: *lsb_order,
                            length,
                            mask: bytes[..needed].to_vec(),
                        }
                    }
                    OptionLayout::Unmasked => OptionMask::Unmasked,
                };
                Value::Option {
                    mask,
                    content: Box::new(self.import(content)?),
                }
            }
            Form::Record { fields } => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        Ok(ValueField {
                            name: field.name.clone(),
                            value: self.import(&field.form)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::Record { length, fields }
            }
            Form::Union { index, variants } => {
                let Buffer::Tags(tags) = self.take(node, "tags")? else {
                    return Err(mistyped(node, "tags"));
                };
                if tags.len() < length {
                    return Err(short(node, "tags", tags.len(), length));
                }
                let tags = tags[..length].to_vec();
                let mut entries = self.index(node, "index")?;
                if entries.len() < length {
                    return Err(short(node, "index", entries.len(), length));
                }
                entries.truncate(length);
                let variants = variants
                    .iter()
                    .map(|variant| self.import(variant))
                    .collect::<Result<Vec<_>>>()?;
                Value::Union {
                    index_width: *index,
                    tags,
                    index: entries,
                    variants,
                }
            }
            Form::String { encoding, layout } => {
                let index = self.list_index(node, *layout, length)?;
                let Buffer::Bytes(bytes) = self.take(node, "bytes")? else {
                    return Err(mistyped(node, "bytes"));
                };
                Value::String {
                    encoding: *encoding,
                    index,
                    bytes: bytes.clone(),
                }
            }
        };
        Ok(value)
    }
}

fn mistyped(node: usize, role: &str) -> Error {
    Error::InvalidBuffers(format!("buffer {} has the wrong kind", key(node, role)))
}

fn short(node: usize, role: &str, found: usize, needed: usize) -> Error {
    Error::InvalidBuffers(format!(
        "buffer {} holds {found} entries, needs {needed}",
        key(node, role)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn nodes_are_numbered_in_pre_order() {
        let value = Value::List {
            index: ListIndex::Offsets {
                width: crate::form::IndexWidth::I64,
                offsets: vec![0, 1, 3],
            },
            content: Box::new(Value::Numpy {
                dtype: DType::UInt8,
                data: Scalars::UInt(vec![7, 8, 9]),
            }),
        };
        let set = to_buffers(&value);
        assert_eq!(set.length, 2);
        assert_eq!(set.buffers.get("node1-length"), Some(&Buffer::Length(3)));
        assert!(set.buffers.contains_key("node0-offsets"));
        assert!(set.buffers.contains_key("node1-data"));
    }

    #[test]
    fn missing_buffer_is_reported() {
        let form = Form::numpy(DType::Int32);
        let err = from_buffers(&form, 0, &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing buffer node0-length"));
    }
}
