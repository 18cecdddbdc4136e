use crate::refs::TypeRef;

/// Index of a variable in a [`MethodBody`](crate::MethodBody)'s variable list.
/// Parameters come first, locals after; register operands store this index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub u16);

/// A method parameter or local. Whether a variable is a parameter only
/// affects ordering; both are addressed by the same register numbering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodVariable {
    pub name: String,
    pub typ: TypeRef,
    pub is_param: bool,
}

impl MethodVariable {
    pub fn param(name: &str, typ: TypeRef) -> MethodVariable {
        MethodVariable {
            name: name.to_string(),
            typ,
            is_param: true,
        }
    }

    pub fn local(name: &str, typ: TypeRef) -> MethodVariable {
        MethodVariable {
            name: name.to_string(),
            typ,
            is_param: false,
        }
    }
}
