use nestgen_core::{Form, Type, Value, Violation, check_consistency};
use serde::{Deserialize, Serialize};

use crate::record::DrawRecord;

/// A value together with its form and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    #[serde(rename = "type")]
    pub ty: Type,
    pub form: Form,
    pub value: Value,
}

impl Triple {
    /// Triple whose form and type are read off `value`.
    pub fn from_value(value: Value) -> Self {
        let form = value.form();
        Self {
            ty: form.project(),
            form,
            value,
        }
    }

    pub fn verify(&self) -> Result<(), Violation> {
        check_consistency(Some(&self.ty), Some(&self.form), Some(&self.value))
    }
}

/// Which parts of the triple a caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "type")]
    pub ty: bool,
    pub form: bool,
    pub value: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            ty: true,
            form: true,
            value: true,
        }
    }
}

/// Shape constraints and output selection for one generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub ty: Option<Type>,
    pub form: Option<Form>,
    pub select: Selection,
}

impl Request {
    pub fn of_type(ty: Type) -> Self {
        Self {
            ty: Some(ty),
            ..Self::default()
        }
    }

    pub fn of_form(form: Form) -> Self {
        Self {
            form: Some(form),
            ..Self::default()
        }
    }
}

/// The selected parts of a generated triple plus the draw log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub record: DrawRecord,
}

impl Output {
    pub(crate) fn select(triple: Triple, select: Selection, record: DrawRecord) -> Self {
        Self {
            ty: select.ty.then_some(triple.ty),
            form: select.form.then_some(triple.form),
            value: select.value.then_some(triple.value),
            record,
        }
    }
}
