//! Reference value types for instruction operands.
//!
//! Types, fields and methods are referenced by name only; nothing here is
//! resolved against loaded pods. Each reference has a canonical printed form
//! that the parser accepts back, so disassembled operands re-assemble to
//! equal values.
//!
//! Type grammar: `pod::Name`, nullable suffix `?`, list suffix `[]`, map
//! forms `[K:V]` and `K:V`, function types `|A,B->R|`.

use std::fmt;

use crate::error::{Error, Result};

/// A named type, structurally parsed. Equality is structural, so `sys::Str?`
/// written anywhere compares equal to any other `sys::Str?`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Basic { pod: String, name: String },
    Nullable(Box<TypeRef>),
    List(Box<TypeRef>),
    Map { key: Box<TypeRef>, value: Box<TypeRef> },
    Func { params: Vec<TypeRef>, ret: Box<TypeRef> },
}

impl TypeRef {
    pub fn basic(pod: &str, name: &str) -> TypeRef {
        TypeRef::Basic {
            pod: pod.to_string(),
            name: name.to_string(),
        }
    }

    pub fn obj() -> TypeRef {
        TypeRef::basic("sys", "Obj")
    }

    pub fn err() -> TypeRef {
        TypeRef::basic("sys", "Err")
    }

    pub fn void() -> TypeRef {
        TypeRef::basic("sys", "Void")
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Basic { pod, name } if pod == "sys" && name == "Void")
    }

    pub fn parse(text: &str) -> Result<TypeRef> {
        let mut p = RefParser::new(text);
        let t = p
            .parse_type(true)
            .filter(|_| p.at_end())
            .ok_or_else(|| Error::MalformedType(text.to_string()))?;
        Ok(t)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Basic { pod, name } => write!(f, "{pod}::{name}"),
            TypeRef::Nullable(inner) => write!(f, "{inner}?"),
            TypeRef::List(elem) => write!(f, "{elem}[]"),
            TypeRef::Map { key, value } => write!(f, "[{key}:{value}]"),
            TypeRef::Func { params, ret } => {
                f.write_str("|")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "->{ret}|")
            }
        }
    }
}

/// A field reference: declaring type, field name, field type. Canonical form
/// is `(sys::Int)acme::Widget.count`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub parent: TypeRef,
    pub name: String,
    pub typ: TypeRef,
}

impl FieldRef {
    pub fn new(parent: TypeRef, name: &str, typ: TypeRef) -> FieldRef {
        FieldRef {
            parent,
            name: name.to_string(),
            typ,
        }
    }

    pub fn parse(text: &str) -> Result<FieldRef> {
        let err = || Error::MalformedField(text.to_string());
        let mut p = RefParser::new(text);
        let parsed = (|| {
            p.expect('(')?;
            let typ = p.parse_type(true)?;
            p.expect(')')?;
            p.skip_ws();
            let parent = p.parse_type(false)?;
            p.expect('.')?;
            let name = p.ident()?;
            p.at_end().then_some(FieldRef { parent, name, typ })
        })();
        parsed.ok_or_else(err)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}.{}", self.typ, self.parent, self.name)
    }
}

/// A method reference: declaring type, name, parameter types, return type.
/// Canonical form is `acme::Widget.resize(sys::Int,sys::Int) -> sys::Void`;
/// when parsing, an omitted `-> Ret` clause means `sys::Void`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub parent: TypeRef,
    pub name: String,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl MethodRef {
    pub fn new(parent: TypeRef, name: &str, params: Vec<TypeRef>, ret: TypeRef) -> MethodRef {
        MethodRef {
            parent,
            name: name.to_string(),
            params,
            ret,
        }
    }

    pub fn returns_void(&self) -> bool {
        self.ret.is_void()
    }

    pub fn parse(text: &str) -> Result<MethodRef> {
        let err = || Error::MalformedMethod(text.to_string());
        let mut p = RefParser::new(text);
        let parsed = (|| {
            let parent = p.parse_type(false)?;
            p.expect('.')?;
            let name = p.ident()?;
            p.expect('(')?;
            let mut params = Vec::new();
            p.skip_ws();
            if !p.eat(')') {
                loop {
                    params.push(p.parse_type(true)?);
                    p.skip_ws();
                    if p.eat(',') {
                        continue;
                    }
                    p.expect(')')?;
                    break;
                }
            }
            p.skip_ws();
            let ret = if p.at_end() {
                TypeRef::void()
            } else {
                p.expect('-')?;
                p.expect('>')?;
                p.skip_ws();
                let ret = p.parse_type(true)?;
                p.at_end().then_some(())?;
                ret
            };
            Some(MethodRef {
                parent,
                name,
                params,
                ret,
            })
        })();
        parsed.ok_or_else(err)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.parent, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

struct RefParser {
    chars: Vec<char>,
    pos: usize,
}

impl RefParser {
    fn new(text: &str) -> RefParser {
        RefParser {
            chars: text.trim().chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Option<()> {
        self.eat(c).then_some(())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos == self.chars.len()
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    /// Parse one type. `shorthand` permits the unbracketed `K:V` map form;
    /// it is disabled where a following `:` belongs to the outer grammar.
    fn parse_type(&mut self, shorthand: bool) -> Option<TypeRef> {
        self.skip_ws();
        let mut t = match self.peek()? {
            '[' => {
                self.pos += 1;
                let key = self.parse_type(false)?;
                self.expect(':')?;
                let value = self.parse_type(false)?;
                self.expect(']')?;
                TypeRef::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            '|' => {
                self.pos += 1;
                let mut params = Vec::new();
                self.skip_ws();
                if self.peek() != Some('|') && self.peek() != Some('-') {
                    loop {
                        params.push(self.parse_type(true)?);
                        self.skip_ws();
                        if !self.eat(',') {
                            break;
                        }
                    }
                }
                let ret = if self.eat('-') {
                    self.expect('>')?;
                    self.parse_type(true)?
                } else {
                    TypeRef::void()
                };
                self.skip_ws();
                self.expect('|')?;
                TypeRef::Func {
                    params,
                    ret: Box::new(ret),
                }
            }
            _ => {
                let pod = self.ident()?;
                self.expect(':')?;
                self.expect(':')?;
                let name = self.ident()?;
                TypeRef::Basic { pod, name }
            }
        };
        loop {
            if self.eat('?') {
                t = TypeRef::Nullable(Box::new(t));
            } else if self.peek() == Some('[') && self.chars.get(self.pos + 1) == Some(&']') {
                self.pos += 2;
                t = TypeRef::List(Box::new(t));
            } else if shorthand && self.peek() == Some(':') && self.chars.get(self.pos + 1) != Some(&':')
            {
                self.pos += 1;
                let value = self.parse_type(true)?;
                t = TypeRef::Map {
                    key: Box::new(t),
                    value: Box::new(value),
                };
            } else {
                return Some(t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) -> String {
        TypeRef::parse(text).unwrap().to_string()
    }

    #[test]
    fn basic_types() {
        assert_eq!(roundtrip("sys::Str"), "sys::Str");
        assert_eq!(roundtrip("sys::Str?"), "sys::Str?");
        assert_eq!(roundtrip("sys::Int[]"), "sys::Int[]");
        assert_eq!(roundtrip("sys::Int[]?"), "sys::Int[]?");
    }

    #[test]
    fn map_types() {
        assert_eq!(roundtrip("[sys::Str:sys::Int]"), "[sys::Str:sys::Int]");
        // Shorthand normalizes to the bracketed form.
        assert_eq!(roundtrip("sys::Str:sys::Int"), "[sys::Str:sys::Int]");
        assert_eq!(roundtrip("[sys::Str:sys::Int]?"), "[sys::Str:sys::Int]?");
    }

    #[test]
    fn func_types() {
        assert_eq!(
            roundtrip("|sys::Int,sys::Str->sys::Bool|"),
            "|sys::Int,sys::Str->sys::Bool|"
        );
        assert_eq!(roundtrip("|->sys::Int|"), "|->sys::Int|");
        assert_eq!(roundtrip("|sys::Int|"), "|sys::Int->sys::Void|");
    }

    #[test]
    fn rejects_garbage() {
        assert!(TypeRef::parse("sys").is_err());
        assert!(TypeRef::parse("sys::").is_err());
        assert!(TypeRef::parse("sys::Str extra").is_err());
        assert!(TypeRef::parse("[sys::Str]").is_err());
    }

    #[test]
    fn field_roundtrip() {
        let f = FieldRef::parse("(sys::Int)acme::Widget.count").unwrap();
        assert_eq!(f.name, "count");
        assert_eq!(f.typ, TypeRef::basic("sys", "Int"));
        assert_eq!(f.to_string(), "(sys::Int)acme::Widget.count");
        assert_eq!(FieldRef::parse(&f.to_string()).unwrap(), f);
    }

    #[test]
    fn method_roundtrip() {
        let m = MethodRef::parse("acme::Widget.resize(sys::Int,sys::Int) -> sys::Bool").unwrap();
        assert_eq!(m.params.len(), 2);
        assert_eq!(m.ret, TypeRef::basic("sys", "Bool"));
        assert_eq!(MethodRef::parse(&m.to_string()).unwrap(), m);
    }

    #[test]
    fn method_without_return_is_void() {
        let m = MethodRef::parse("acme::Widget.clear()").unwrap();
        assert!(m.returns_void());
        assert_eq!(m.to_string(), "acme::Widget.clear() -> sys::Void");
    }
}
