use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::types::{
    Field, StringEncoding, Type, TypeKind, check_field_names, check_union_variants,
};

/// Integer width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndexWidth {
    I32,
    U32,
    I64,
}

impl IndexWidth {
    pub const ALL: [IndexWidth; 3] = [IndexWidth::I32, IndexWidth::U32, IndexWidth::I64];
    /// Widths allowed for option indexes, which need a negative sentinel.
    pub const SIGNED: [IndexWidth; 2] = [IndexWidth::I32, IndexWidth::I64];

    /// True when `value` is representable at this width.
    pub fn fits(self, value: i64) -> bool {
        match self {
            IndexWidth::I32 => i32::try_from(value).is_ok(),
            IndexWidth::U32 => u32::try_from(value).is_ok(),
            IndexWidth::I64 => true,
        }
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, IndexWidth::U32)
    }
}

impl fmt::Display for IndexWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexWidth::I32 => "i32",
            IndexWidth::U32 => "u32",
            IndexWidth::I64 => "i64",
        };
        f.write_str(name)
    }
}

/// Physical representation of variable-length lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum ListLayout {
    /// Contiguous: one offsets buffer of `length + 1` entries.
    Offsets { width: IndexWidth },
    /// Indexed: separate starts and stops buffers.
    StartsStops { width: IndexWidth },
}

impl ListLayout {
    pub fn width(self) -> IndexWidth {
        match self {
            ListLayout::Offsets { width } | ListLayout::StartsStops { width } => width,
        }
    }
}

/// Physical representation of missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum OptionLayout {
    /// Index into the content; negative entries are missing.
    Indexed { width: IndexWidth },
    /// One byte per entry.
    ByteMasked { valid_when: bool },
    /// One bit per entry.
    BitMasked { valid_when: bool, lsb_order: bool },
    /// Nullable type without any missing entries.
    Unmasked,
}

/// Physical-layout descriptor. Projects onto exactly one [`Type`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Form {
    Numpy {
        dtype: DType,
    },
    List {
        layout: ListLayout,
        content: Box<Form>,
    },
    Regular {
        size: usize,
        content: Box<Form>,
    },
    Option {
        layout: OptionLayout,
        content: Box<Form>,
    },
    Record {
        fields: Vec<FormField>,
    },
    Union {
        index: IndexWidth,
        variants: Vec<Form>,
    },
    String {
        encoding: StringEncoding,
        layout: ListLayout,
    },
}

/// Named record field of a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FormField {
    pub name: String,
    pub form: Form,
}

impl Form {
    pub fn numpy(dtype: DType) -> Self {
        Form::Numpy { dtype }
    }

    pub fn list(layout: ListLayout, content: Form) -> Self {
        Form::List {
            layout,
            content: Box::new(content),
        }
    }

    pub fn regular(content: Form, size: usize) -> Self {
        Form::Regular {
            content: Box::new(content),
            size,
        }
    }

    pub fn option(layout: OptionLayout, content: Form) -> Result<Self> {
        check_option(layout, &content)?;
        Ok(Form::Option {
            layout,
            content: Box::new(content),
        })
    }

    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Form)>) -> Result<Self> {
        let fields: Vec<FormField> = fields
            .into_iter()
            .map(|(name, form)| FormField {
                name: name.into(),
                form,
            })
            .collect();
        check_field_names(fields.iter().map(|field| field.name.as_str()))
            .map_err(Error::InvalidForm)?;
        Ok(Form::Record { fields })
    }

    pub fn union(index: IndexWidth, variants: impl IntoIterator<Item = Form>) -> Result<Self> {
        let variants: Vec<Form> = variants.into_iter().collect();
        check_union_variants(variants.iter().map(Form::kind)).map_err(Error::InvalidForm)?;
        Ok(Form::Union { index, variants })
    }

    pub fn string(encoding: StringEncoding, layout: ListLayout) -> Self {
        Form::String { encoding, layout }
    }

    /// A fixed default layout for `ty`: 64-bit offsets, 64-bit option
    /// indexes and 64-bit union indexes.
    pub fn canonical(ty: &Type) -> Form {
        let offsets = ListLayout::Offsets {
            width: IndexWidth::I64,
        };
        match ty {
            Type::Leaf { dtype } => Form::numpy(*dtype),
            Type::List { content } => Form::list(offsets, Form::canonical(content)),
            Type::Regular { content, size } => Form::regular(Form::canonical(content), *size),
            Type::Option { content } => Form::Option {
                layout: OptionLayout::Indexed {
                    width: IndexWidth::I64,
                },
                content: Box::new(Form::canonical(content)),
            },
            Type::Record { fields } => Form::Record {
                fields: fields
                    .iter()
                    .map(|field| FormField {
                        name: field.name.clone(),
                        form: Form::canonical(&field.ty),
                    })
                    .collect(),
            },
            Type::Union { variants } => Form::Union {
                index: IndexWidth::I64,
                variants: variants.iter().map(Form::canonical).collect(),
            },
            Type::String { encoding } => Form::string(*encoding, offsets),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Form::Numpy { .. } => TypeKind::Leaf,
            Form::List { .. } => TypeKind::List,
            Form::Regular { .. } => TypeKind::Regular,
            Form::Option { .. } => TypeKind::Option,
            Form::Record { .. } => TypeKind::Record,
            Form::Union { .. } => TypeKind::Union,
            Form::String { .. } => TypeKind::String,
        }
    }

    pub fn children(&self) -> Vec<&Form> {
        match self {
            Form::Numpy { .. } | Form::String { .. } => Vec::new(),
            Form::List { content, .. } | Form::Regular { content, .. } | Form::Option { content, .. } => {
                vec![content.as_ref()]
            }
            Form::Record { fields } => fields.iter().map(|field| &field.form).collect(),
            Form::Union { variants, .. } => variants.iter().collect(),
        }
    }

    /// Strip layout parameters. Total, and commutes with recursion.
    pub fn project(&self) -> Type {
        match self {
            Form::Numpy { dtype } => Type::Leaf { dtype: *dtype },
            Form::List { content, .. } => Type::List {
                content: Box::new(content.project()),
            },
            Form::Regular { size, content } => Type::Regular {
                content: Box::new(content.project()),
                size: *size,
            },
            Form::Option { content, .. } => Type::Option {
                content: Box::new(content.project()),
            },
            Form::Record { fields } => Type::Record {
                fields: fields
                    .iter()
                    .map(|field| Field {
                        name: field.name.clone(),
                        ty: field.form.project(),
                    })
                    .collect(),
            },
            Form::Union { variants, .. } => Type::Union {
                variants: variants.iter().map(Form::project).collect(),
            },
            Form::String { encoding, .. } => Type::String {
                encoding: *encoding,
            },
        }
    }

    /// Re-check every local invariant recursively.
    pub fn validate(&self) -> Result<()> {
        match self {
            Form::Option { layout, content } => check_option(*layout, content)?,
            Form::Record { fields } => {
                check_field_names(fields.iter().map(|field| field.name.as_str()))
                    .map_err(Error::InvalidForm)?;
            }
            Form::Union { variants, .. } => {
                check_union_variants(variants.iter().map(Form::kind)).map_err(Error::InvalidForm)?;
            }
            _ => {}
        }
        self.children().into_iter().try_for_each(Form::validate)
    }
}

fn check_option(layout: OptionLayout, content: &Form) -> Result<()> {
    if content.kind() == TypeKind::Option {
        return Err(Error::InvalidForm(
            "option content must not be an option".to_string(),
        ));
    }
    if let OptionLayout::Indexed { width } = layout
        && !width.is_signed()
    {
        return Err(Error::InvalidForm(format!(
            "option index must be signed, got {width}"
        )));
    }
    Ok(())
}
