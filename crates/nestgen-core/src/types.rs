use std::collections::BTreeSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dtype::DType;
use crate::error::{Error, Result};

/// Encoding of a string leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    /// UTF-8 text (`string`).
    Utf8,
    /// Raw bytes (`bytes`).
    Bytes,
}

/// Variant tag shared by types, forms and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    Leaf,
    List,
    Regular,
    Option,
    Record,
    Union,
    String,
}

impl TypeKind {
    pub const ALL: [TypeKind; 7] = [
        TypeKind::Leaf,
        TypeKind::List,
        TypeKind::Regular,
        TypeKind::Option,
        TypeKind::Record,
        TypeKind::Union,
        TypeKind::String,
    ];

    /// True for variants that carry children.
    pub fn is_composite(self) -> bool {
        !matches!(self, TypeKind::Leaf | TypeKind::String)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Leaf => "leaf",
            TypeKind::List => "list",
            TypeKind::Regular => "regular",
            TypeKind::Option => "option",
            TypeKind::Record => "record",
            TypeKind::Union => "union",
            TypeKind::String => "string",
        };
        f.write_str(name)
    }
}

/// Structural descriptor of a nested array, independent of physical layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Leaf { dtype: DType },
    List { content: Box<Type> },
    Regular { content: Box<Type>, size: usize },
    Option { content: Box<Type> },
    Record { fields: Vec<Field> },
    Union { variants: Vec<Type> },
    String { encoding: StringEncoding },
}

/// Named record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Type {
    pub fn leaf(dtype: DType) -> Self {
        Type::Leaf { dtype }
    }

    pub fn list(content: Type) -> Self {
        Type::List {
            content: Box::new(content),
        }
    }

    pub fn regular(content: Type, size: usize) -> Self {
        Type::Regular {
            content: Box::new(content),
            size,
        }
    }

    /// Nullable wrapper; the content must not itself be nullable.
    pub fn option(content: Type) -> Result<Self> {
        if content.kind() == TypeKind::Option {
            return Err(Error::InvalidType(
                "option content must not be an option".to_string(),
            ));
        }
        Ok(Type::Option {
            content: Box::new(content),
        })
    }

    /// Record with uniquely named fields, in the given order.
    pub fn record<N: Into<String>>(fields: impl IntoIterator<Item = (N, Type)>) -> Result<Self> {
        let fields: Vec<Field> = fields
            .into_iter()
            .map(|(name, ty)| Field {
                name: name.into(),
                ty,
            })
            .collect();
        check_field_names(fields.iter().map(|field| field.name.as_str()))
            .map_err(Error::InvalidType)?;
        Ok(Type::Record { fields })
    }

    /// Tagged union over at least one non-union variant.
    pub fn union(variants: impl IntoIterator<Item = Type>) -> Result<Self> {
        let variants: Vec<Type> = variants.into_iter().collect();
        check_union_variants(variants.iter().map(Type::kind)).map_err(Error::InvalidType)?;
        Ok(Type::Union { variants })
    }

    pub fn string() -> Self {
        Type::String {
            encoding: StringEncoding::Utf8,
        }
    }

    pub fn bytestring() -> Self {
        Type::String {
            encoding: StringEncoding::Bytes,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Leaf { .. } => TypeKind::Leaf,
            Type::List { .. } => TypeKind::List,
            Type::Regular { .. } => TypeKind::Regular,
            Type::Option { .. } => TypeKind::Option,
            Type::Record { .. } => TypeKind::Record,
            Type::Union { .. } => TypeKind::Union,
            Type::String { .. } => TypeKind::String,
        }
    }

    /// Direct children in declaration order.
    pub fn children(&self) -> Vec<&Type> {
        match self {
            Type::Leaf { .. } | Type::String { .. } => Vec::new(),
            Type::List { content } | Type::Regular { content, .. } | Type::Option { content } => {
                vec![content.as_ref()]
            }
            Type::Record { fields } => fields.iter().map(|field| &field.ty).collect(),
            Type::Union { variants } => variants.iter().collect(),
        }
    }

    /// Number of composite layers on the deepest path.
    pub fn depth(&self) -> usize {
        if !self.kind().is_composite() {
            return 0;
        }
        1 + self
            .children()
            .into_iter()
            .map(Type::depth)
            .max()
            .unwrap_or(0)
    }

    /// Every leaf dtype in the tree, pre-order.
    pub fn dtypes(&self) -> Vec<DType> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Type::Leaf { dtype } = node {
                out.push(*dtype);
            }
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    /// True when any node in the tree has the given kind.
    pub fn contains_kind(&self, kind: TypeKind) -> bool {
        self.kind() == kind || self.children().into_iter().any(|child| child.contains_kind(kind))
    }

    /// Re-check every local invariant recursively.
    ///
    /// Constructors already enforce these, but variants are public and can be
    /// built directly.
    pub fn validate(&self) -> Result<()> {
        match self {
            Type::Option { content } if content.kind() == TypeKind::Option => {
                return Err(Error::InvalidType(
                    "option content must not be an option".to_string(),
                ));
            }
            Type::Record { fields } => {
                check_field_names(fields.iter().map(|field| field.name.as_str()))
                    .map_err(Error::InvalidType)?;
            }
            Type::Union { variants } => {
                check_union_variants(variants.iter().map(Type::kind)).map_err(Error::InvalidType)?;
            }
            _ => {}
        }
        self.children().into_iter().try_for_each(Type::validate)
    }
}

pub(crate) fn check_field_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> std::result::Result<(), String> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(format!("duplicate field name '{name}'"));
        }
    }
    Ok(())
}

pub(crate) fn check_union_variants(
    kinds: impl IntoIterator<Item = TypeKind>,
) -> std::result::Result<(), String> {
    let mut count = 0;
    for kind in kinds {
        if kind == TypeKind::Union {
            return Err("union variants must not be unions".to_string());
        }
        count += 1;
    }
    if count == 0 {
        return Err("union requires at least one variant".to_string());
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Leaf { dtype } => write!(f, "{dtype}"),
            Type::List { content } => write!(f, "var * {content}"),
            Type::Regular { content, size } => write!(f, "{size} * {content}"),
            Type::Option { content } => match content.kind() {
                TypeKind::Leaf | TypeKind::String => write!(f, "?{content}"),
                _ => write!(f, "option[{content}]"),
            },
            Type::Record { fields } => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", field.name, field.ty)?;
                }
                f.write_str("}")
            }
            Type::Union { variants } => {
                f.write_str("union[")?;
                for (i, variant) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{variant}")?;
                }
                f.write_str("]")
            }
            Type::String {
                encoding: StringEncoding::Utf8,
            } => f.write_str("string"),
            Type::String {
                encoding: StringEncoding::Bytes,
            } => f.write_str("bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_rejects_duplicate_names() {
        let err = Type::record([
            ("x", Type::leaf(DType::Int32)),
            ("x", Type::leaf(DType::Float64)),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate field name 'x'"));
    }

    #[test]
    fn union_rejects_empty_and_nested() {
        assert!(Type::union(Vec::new()).is_err());
        let inner = Type::union([Type::leaf(DType::Int8)]).unwrap();
        assert!(Type::union([inner, Type::string()]).is_err());
    }

    #[test]
    fn option_rejects_option_content() {
        let inner = Type::option(Type::leaf(DType::Bool)).unwrap();
        assert!(Type::option(inner).is_err());
    }

    #[test]
    fn validate_catches_literal_construction() {
        let ty = Type::List {
            content: Box::new(Type::Record {
                fields: vec![
                    Field {
                        name: "a".to_string(),
                        ty: Type::string(),
                    },
                    Field {
                        name: "a".to_string(),
                        ty: Type::bytestring(),
                    },
                ],
            }),
        };
        assert!(ty.validate().is_err());
    }

    #[test]
    fn depth_counts_composite_layers() {
        let ty = Type::list(Type::regular(Type::leaf(DType::Int64), 2));
        assert_eq!(ty.depth(), 2);
        assert_eq!(Type::string().depth(), 0);
    }

    #[test]
    fn display_reads_like_a_datashape() {
        let ty = Type::list(
            Type::record([
                ("x", Type::option(Type::leaf(DType::Float32)).unwrap()),
                ("y", Type::regular(Type::string(), 3)),
            ])
            .unwrap(),
        );
        assert_eq!(ty.to_string(), r#"var * {"x": ?float32, "y": 3 * string}"#);
    }
}
